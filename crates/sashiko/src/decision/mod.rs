mod broker;
mod request;

pub use broker::{DecisionBroker, ResolvedEvents};
pub use request::{
    DecisionHandler, DecisionRequest, DecisionResult, InitialDecisionRequest,
    InitialDecisionResult,
};

pub(crate) use request::DecisionOutcome;

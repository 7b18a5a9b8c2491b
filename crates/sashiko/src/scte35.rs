//! Minimal SCTE-35 splice info section decoder.
//!
//! Decodes the binary payloads carried by `SCTE35-CMD` / `SCTE35-OUT` /
//! `SCTE35-IN` daterange attributes far enough to expose the splice command
//! and the scheduled break duration (90 kHz ticks). Descriptors, encryption
//! and CRC validation are out of scope.

use crate::error::{SashikoError, SashikoResult};

/// One tick is 1/90000 s.
pub const TICKS_PER_SECOND: u64 = 90_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakDuration {
    pub auto_return: bool,
    /// Scheduled break duration in 90 kHz ticks.
    pub ticks: u64,
}

impl BreakDuration {
    pub fn seconds(&self) -> f64 {
        self.ticks as f64 / TICKS_PER_SECOND as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceInsert {
    pub event_id: u32,
    pub cancel: bool,
    pub out_of_network: bool,
    pub pts_time: Option<u64>,
    pub break_duration: Option<BreakDuration>,
    pub unique_program_id: u16,
    pub avail_num: u8,
    pub avails_expected: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSignal {
    pub pts_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceCommand {
    SpliceNull,
    SpliceInsert(SpliceInsert),
    TimeSignal(TimeSignal),
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceInfoSection {
    pub pts_adjustment: u64,
    pub command: SpliceCommand,
}

impl SpliceInfoSection {
    /// Parses a `0x`-prefixed hexadecimal payload as found in daterange
    /// attribute lists.
    pub fn parse_hex(payload: &str) -> SashikoResult<Self> {
        let payload = payload
            .strip_prefix("0x")
            .or_else(|| payload.strip_prefix("0X"))
            .unwrap_or(payload);
        let data = hex::decode(payload)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> SashikoResult<Self> {
        let mut reader = BitReader::new(data);

        let table_id = reader.read(8)?;
        if table_id != 0xFC {
            return Err(SashikoError::Scte35ParseError(format!(
                "unexpected table id {table_id:#04x}"
            )));
        }
        // section_syntax_indicator, private_indicator, sap_type, section_length
        reader.skip(16)?;
        // protocol_version
        reader.skip(8)?;
        // encrypted_packet, encryption_algorithm
        reader.skip(7)?;
        let pts_adjustment = reader.read(33)?;
        // cw_index, tier, splice_command_length
        reader.skip(8 + 12 + 12)?;
        let command_type = reader.read(8)? as u8;

        let command = match command_type {
            0x00 => SpliceCommand::SpliceNull,
            0x05 => SpliceCommand::SpliceInsert(parse_splice_insert(&mut reader)?),
            0x06 => SpliceCommand::TimeSignal(TimeSignal {
                pts_time: parse_splice_time(&mut reader)?,
            }),
            other => SpliceCommand::Other(other),
        };

        Ok(Self {
            pts_adjustment,
            command,
        })
    }

    /// The scheduled break duration, when the command carries one.
    pub fn scheduled_break_duration(&self) -> Option<BreakDuration> {
        match &self.command {
            SpliceCommand::SpliceInsert(insert) => insert.break_duration,
            _ => None,
        }
    }
}

fn parse_splice_insert(reader: &mut BitReader) -> SashikoResult<SpliceInsert> {
    let event_id = reader.read(32)? as u32;
    let cancel = reader.flag()?;
    reader.skip(7)?;

    let mut insert = SpliceInsert {
        event_id,
        cancel,
        out_of_network: false,
        pts_time: None,
        break_duration: None,
        unique_program_id: 0,
        avail_num: 0,
        avails_expected: 0,
    };
    if cancel {
        return Ok(insert);
    }

    insert.out_of_network = reader.flag()?;
    let program_splice = reader.flag()?;
    let duration_flag = reader.flag()?;
    let splice_immediate = reader.flag()?;
    reader.skip(4)?;

    if program_splice {
        if !splice_immediate {
            insert.pts_time = parse_splice_time(reader)?;
        }
    } else {
        let component_count = reader.read(8)?;
        for _ in 0..component_count {
            reader.skip(8)?;
            if !splice_immediate {
                parse_splice_time(reader)?;
            }
        }
    }
    if duration_flag {
        let auto_return = reader.flag()?;
        reader.skip(6)?;
        let ticks = reader.read(33)?;
        insert.break_duration = Some(BreakDuration { auto_return, ticks });
    }
    insert.unique_program_id = reader.read(16)? as u16;
    insert.avail_num = reader.read(8)? as u8;
    insert.avails_expected = reader.read(8)? as u8;
    Ok(insert)
}

fn parse_splice_time(reader: &mut BitReader) -> SashikoResult<Option<u64>> {
    if reader.flag()? {
        reader.skip(6)?;
        Ok(Some(reader.read(33)?))
    } else {
        reader.skip(7)?;
        Ok(None)
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read(&mut self, bits: usize) -> SashikoResult<u64> {
        debug_assert!(bits <= 64);
        if self.position + bits > self.data.len() * 8 {
            return Err(SashikoError::Scte35ParseError(format!(
                "section truncated at bit {}",
                self.position
            )));
        }
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.data[self.position / 8];
            let bit = (byte >> (7 - self.position % 8)) & 1;
            value = (value << 1) | bit as u64;
            self.position += 1;
        }
        Ok(value)
    }

    fn flag(&mut self) -> SashikoResult<bool> {
        Ok(self.read(1)? == 1)
    }

    fn skip(&mut self, bits: usize) -> SashikoResult<()> {
        self.read(bits).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // splice_insert, out of network, pts_time 0, 30s break duration
    // (2_700_000 ticks), auto return.
    const SPLICE_OUT_30S: &str =
        "0xFC3025000000000000FFFFF01405000000017FEFFE00000000FE002932E000000000000000000000";

    // time_signal with pts_time 0x1000.
    const TIME_SIGNAL: &str = "0xFC3016000000000000FFFFF00506FE00001000000000000000";

    #[test]
    fn test_parse_splice_insert() {
        let section = SpliceInfoSection::parse_hex(SPLICE_OUT_30S).unwrap();
        assert_eq!(section.pts_adjustment, 0);
        let SpliceCommand::SpliceInsert(insert) = &section.command else {
            panic!("expected splice insert, got {:?}", section.command);
        };
        assert_eq!(insert.event_id, 1);
        assert!(!insert.cancel);
        assert!(insert.out_of_network);
        assert_eq!(insert.pts_time, Some(0));

        let duration = section.scheduled_break_duration().unwrap();
        assert!(duration.auto_return);
        assert_eq!(duration.ticks, 2_700_000);
        assert_eq!(duration.seconds(), 30.0);
    }

    #[test]
    fn test_parse_time_signal() {
        let section = SpliceInfoSection::parse_hex(TIME_SIGNAL).unwrap();
        let SpliceCommand::TimeSignal(signal) = &section.command else {
            panic!("expected time signal, got {:?}", section.command);
        };
        assert_eq!(signal.pts_time, Some(0x1000));
        assert!(section.scheduled_break_duration().is_none());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(SpliceInfoSection::parse_hex("0xZZ").is_err());
        assert!(SpliceInfoSection::parse_hex("0xFF00").is_err());
        assert!(SpliceInfoSection::parse_hex("0xFC30").is_err());
    }
}

use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::number::complete::be_u16;

use super::{DhGroupList, Encrypted, HipCipher, HostId, Puzzle, R1Counter, Solution};
use crate::Error;

/// Parameter type codes.
///
/// Anything not listed here fails to decode; an unrecognized parameter could
/// change the meaning of the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterType {
    R1Counter,
    Puzzle,
    Solution,
    HipCipher,
    Encrypted,
    EncryptedKey,
    HostId,
    HitSuiteList,
    DhGroupList,
    HipMac3,
    EchoResponseUnsigned,
    EchoRequestUnsigned,
}

impl ParameterType {
    pub fn from_u16(value: u16) -> Option<Self> {
        let t = match value {
            128 => ParameterType::R1Counter,
            257 => ParameterType::Puzzle,
            321 => ParameterType::Solution,
            579 => ParameterType::HipCipher,
            641 => ParameterType::Encrypted,
            643 => ParameterType::EncryptedKey,
            705 => ParameterType::HostId,
            715 => ParameterType::HitSuiteList,
            2151 => ParameterType::DhGroupList,
            61507 => ParameterType::HipMac3,
            63425 => ParameterType::EchoResponseUnsigned,
            63661 => ParameterType::EchoRequestUnsigned,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ParameterType::R1Counter => 128,
            ParameterType::Puzzle => 257,
            ParameterType::Solution => 321,
            ParameterType::HipCipher => 579,
            ParameterType::Encrypted => 641,
            ParameterType::EncryptedKey => 643,
            ParameterType::HostId => 705,
            ParameterType::HitSuiteList => 715,
            ParameterType::DhGroupList => 2151,
            ParameterType::HipMac3 => 61507,
            ParameterType::EchoResponseUnsigned => 63425,
            ParameterType::EchoRequestUnsigned => 63661,
        }
    }
}

/// A HIP parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    R1Counter(R1Counter),
    Puzzle(Puzzle),
    Solution(Solution),
    HipCipher(HipCipher),
    Encrypted(Encrypted),
    EncryptedKey(Vec<u8>),
    HostId(HostId),
    HitSuiteList(Vec<u8>),
    DhGroupList(DhGroupList),
    HipMac3(Vec<u8>),
    EchoResponseUnsigned(Vec<u8>),
    EchoRequestUnsigned(Vec<u8>),
}

/// Size of a TLV on the wire: `4 + content_len` rounded up to a multiple of 8.
pub fn padded_len(content_len: usize) -> usize {
    (4 + content_len).div_ceil(8) * 8
}

impl Parameter {
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Parameter::R1Counter(_) => ParameterType::R1Counter,
            Parameter::Puzzle(_) => ParameterType::Puzzle,
            Parameter::Solution(_) => ParameterType::Solution,
            Parameter::HipCipher(_) => ParameterType::HipCipher,
            Parameter::Encrypted(_) => ParameterType::Encrypted,
            Parameter::EncryptedKey(_) => ParameterType::EncryptedKey,
            Parameter::HostId(_) => ParameterType::HostId,
            Parameter::HitSuiteList(_) => ParameterType::HitSuiteList,
            Parameter::DhGroupList(_) => ParameterType::DhGroupList,
            Parameter::HipMac3(_) => ParameterType::HipMac3,
            Parameter::EchoResponseUnsigned(_) => ParameterType::EchoResponseUnsigned,
            Parameter::EchoRequestUnsigned(_) => ParameterType::EchoRequestUnsigned,
        }
    }

    /// Decode parameter content of type code `ty`.
    ///
    /// The content must be consumed exactly.
    pub fn decode(ty: u16, content: &[u8]) -> Result<Parameter, Error> {
        let Some(pt) = ParameterType::from_u16(ty) else {
            return Err(Error::UnknownParameter(ty));
        };

        let parsed = match pt {
            ParameterType::R1Counter => {
                all_consuming(R1Counter::parse)(content).map(|(_, v)| Parameter::R1Counter(v))
            }
            ParameterType::Puzzle => {
                all_consuming(Puzzle::parse)(content).map(|(_, v)| Parameter::Puzzle(v))
            }
            ParameterType::Solution => {
                all_consuming(Solution::parse)(content).map(|(_, v)| Parameter::Solution(v))
            }
            ParameterType::HipCipher => {
                all_consuming(HipCipher::parse)(content).map(|(_, v)| Parameter::HipCipher(v))
            }
            ParameterType::Encrypted => {
                all_consuming(Encrypted::parse)(content).map(|(_, v)| Parameter::Encrypted(v))
            }
            ParameterType::HostId => {
                all_consuming(HostId::parse)(content).map(|(_, v)| Parameter::HostId(v))
            }
            ParameterType::DhGroupList => all_consuming(DhGroupList::parse)(content)
                .map(|(_, v)| Parameter::DhGroupList(v)),
            ParameterType::EncryptedKey => Ok(Parameter::EncryptedKey(content.to_vec())),
            ParameterType::HitSuiteList => Ok(Parameter::HitSuiteList(content.to_vec())),
            ParameterType::HipMac3 => Ok(Parameter::HipMac3(content.to_vec())),
            ParameterType::EchoResponseUnsigned => {
                Ok(Parameter::EchoResponseUnsigned(content.to_vec()))
            }
            ParameterType::EchoRequestUnsigned => {
                Ok(Parameter::EchoRequestUnsigned(content.to_vec()))
            }
        };

        parsed.map_err(|_| Error::InvalidParameter(pt))
    }

    /// Parse one TLV off the front of `input`, padding included.
    pub fn parse(input: &[u8]) -> Result<(&[u8], Parameter), Error> {
        if input.len() < 4 {
            return Err(Error::TooShort);
        }
        let (rest, ty) = be_u16(input)?;
        let (rest, len) = be_u16(rest)?;
        let len = len as usize;

        let total = padded_len(len);
        if input.len() < total {
            return Err(Error::TooShort);
        }

        let (rest, content) = take(len)(rest)?;
        let (rest, _padding) = take(total - 4 - len)(rest)?;

        let parameter = Parameter::decode(ty, content)?;
        Ok((rest, parameter))
    }

    /// Append the TLV encoding, padding included.
    ///
    /// Content that does not fit the 16-bit length leaves `out` untouched.
    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let start = out.len();
        out.extend_from_slice(&self.parameter_type().as_u16().to_be_bytes());
        // length, filled in below
        out.extend_from_slice(&[0, 0]);

        match self {
            Parameter::R1Counter(v) => v.serialize(out),
            Parameter::Puzzle(v) => v.serialize(out),
            Parameter::Solution(v) => v.serialize(out),
            Parameter::HipCipher(v) => v.serialize(out),
            Parameter::Encrypted(v) => v.serialize(out),
            Parameter::HostId(v) => {
                if let Err(e) = v.serialize(out) {
                    out.truncate(start);
                    return Err(e);
                }
            }
            Parameter::DhGroupList(v) => v.serialize(out),
            Parameter::EncryptedKey(v)
            | Parameter::HitSuiteList(v)
            | Parameter::HipMac3(v)
            | Parameter::EchoResponseUnsigned(v)
            | Parameter::EchoRequestUnsigned(v) => out.extend_from_slice(v),
        }

        let len = out.len() - start - 4;
        if len > u16::MAX as usize {
            out.truncate(start);
            return Err(Error::InvalidParameter(self.parameter_type()));
        }
        out[start + 2..start + 4].copy_from_slice(&(len as u16).to_be_bytes());
        out.resize(start + padded_len(len), 0);
        Ok(())
    }
}

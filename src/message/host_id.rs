use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::ParameterType;
use crate::crypto::EcdhCurve;
use crate::Error;

/// HI algorithm for ECDH host identities (RFC 9028).
pub const ALGORITHM_ECDH: u16 = 11;

/// The DI length shares 16 bits with the 4-bit DI type.
pub const MAX_DOMAIN_IDENTIFIER_LEN: usize = 0x0fff;

/// HOST_ID: the sender's public ECDH key and an optional domain identifier.
///
/// ```text
/// HI length (16) | DI-type (4) | DI length (12) | algorithm (16)
/// HI: curve (16) | uncompressed public key
/// DI
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostId {
    pub curve: EcdhCurve,
    pub public_key: Vec<u8>,
    pub di_type: u8,
    pub domain_identifier: Vec<u8>,
}

impl HostId {
    pub fn new(curve: EcdhCurve, public_key: &[u8]) -> Self {
        HostId {
            curve,
            public_key: public_key.to_vec(),
            di_type: 0,
            domain_identifier: Vec::new(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HostId> {
        let original = input;
        let fail = |kind| nom::Err::Error(nom::error::Error::new(original, kind));

        let (input, hi_len) = be_u16(input)?;
        let (input, di) = be_u16(input)?;
        let (input, algorithm) = be_u16(input)?;
        if algorithm != ALGORITHM_ECDH {
            return Err(fail(nom::error::ErrorKind::Verify));
        }

        let (input, hi) = take(hi_len)(input)?;
        let (input, domain_identifier) = take(di & 0x0fff)(input)?;

        let (public_key, curve_id) = be_u16(hi)?;
        let curve = EcdhCurve::from_u16(curve_id).ok_or(fail(nom::error::ErrorKind::Alt))?;
        if public_key.len() != curve.public_key_len() {
            return Err(fail(nom::error::ErrorKind::LengthValue));
        }

        Ok((
            input,
            HostId {
                curve,
                public_key: public_key.to_vec(),
                di_type: (di >> 12) as u8,
                domain_identifier: domain_identifier.to_vec(),
            },
        ))
    }

    /// Fails if the HI or DI length does not fit its field.
    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let hi_len = 2 + self.public_key.len();
        if hi_len > u16::MAX as usize || self.domain_identifier.len() > MAX_DOMAIN_IDENTIFIER_LEN
        {
            return Err(Error::InvalidParameter(ParameterType::HostId));
        }
        let di = ((self.di_type as u16 & 0x0f) << 12) | self.domain_identifier.len() as u16;

        out.extend_from_slice(&(hi_len as u16).to_be_bytes());
        out.extend_from_slice(&di.to_be_bytes());
        out.extend_from_slice(&ALGORITHM_ECDH.to_be_bytes());
        out.extend_from_slice(&self.curve.as_u16().to_be_bytes());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.domain_identifier);
        Ok(())
    }
}

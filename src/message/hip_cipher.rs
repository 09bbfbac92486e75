use nom::combinator::map;
use nom::multi::many0;
use nom::number::complete::be_u16;
use nom::IResult;
use tinyvec::ArrayVec;

pub const MAX_CIPHERS: usize = 8;

/// HIP_CIPHER suite identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherId {
    Null,
    Aes128Cbc,
    Aes256Cbc,
    Unknown(u16),
}

impl Default for CipherId {
    fn default() -> Self {
        CipherId::Unknown(0)
    }
}

impl CipherId {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => CipherId::Null,
            2 => CipherId::Aes128Cbc,
            4 => CipherId::Aes256Cbc,
            _ => CipherId::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherId::Null => 1,
            CipherId::Aes128Cbc => 2,
            CipherId::Aes256Cbc => 4,
            CipherId::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherId> {
        map(be_u16, CipherId::from_u16)(input)
    }
}

/// HIP_CIPHER: offered ciphers, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HipCipher {
    ciphers: ArrayVec<[CipherId; MAX_CIPHERS]>,
}

impl HipCipher {
    pub fn ciphers(&self) -> &[CipherId] {
        &self.ciphers
    }

    /// First cipher of ours, in our order, that the peer also offers.
    pub fn select(&self, ours: &[CipherId]) -> Option<CipherId> {
        ours.iter().copied().find(|c| self.ciphers.contains(c))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HipCipher> {
        let (rest, parsed) = many0(CipherId::parse)(input)?;
        let mut ciphers = ArrayVec::new();
        for c in parsed {
            if ciphers.try_push(c).is_some() {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
        }
        Ok((rest, HipCipher { ciphers }))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        for c in self.ciphers.iter() {
            out.extend_from_slice(&c.as_u16().to_be_bytes());
        }
    }
}

impl FromIterator<CipherId> for HipCipher {
    /// Ciphers beyond [`MAX_CIPHERS`] are dropped.
    fn from_iter<T: IntoIterator<Item = CipherId>>(iter: T) -> Self {
        let ciphers = iter.into_iter().take(MAX_CIPHERS).collect();
        HipCipher { ciphers }
    }
}

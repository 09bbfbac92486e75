use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// Lifetime exponent sent in PUZZLE; the puzzle is valid for 2^(lifetime - 32) seconds.
pub const DEFAULT_LIFETIME: u8 = 64;

/// PUZZLE: the responder's challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    /// Required number of leading zero bits.
    pub k: u8,
    pub lifetime: u8,
    /// Echoed back unchanged in SOLUTION.
    pub opaque: u16,
    /// The random value I.
    pub random_i: [u8; 16],
}

impl Puzzle {
    pub fn new(k: u8, random_i: [u8; 16], opaque: u16) -> Self {
        Puzzle {
            k,
            lifetime: DEFAULT_LIFETIME,
            opaque,
            random_i,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Puzzle> {
        let (input, k) = be_u8(input)?;
        let (input, lifetime) = be_u8(input)?;
        let (input, opaque) = be_u16(input)?;
        let (input, random_i) = take(16_usize)(input)?;

        let mut i = [0u8; 16];
        i.copy_from_slice(random_i);

        Ok((
            input,
            Puzzle {
                k,
                lifetime,
                opaque,
                random_i: i,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.k);
        out.push(self.lifetime);
        out.extend_from_slice(&self.opaque.to_be_bytes());
        out.extend_from_slice(&self.random_i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let puzzle = Puzzle::new(8, [0xaa; 16], 0x1234);

        let mut serialized = Vec::new();
        puzzle.serialize(&mut serialized);
        assert_eq!(&serialized[..4], &[8, 64, 0x12, 0x34]);
        assert_eq!(serialized.len(), 20);

        let (rest, parsed) = Puzzle::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, puzzle);
    }

    #[test]
    fn truncated() {
        assert!(Puzzle::parse(&[8, 64, 0, 0, 1, 2, 3]).is_err());
    }
}

use nom::number::complete::{be_u32, be_u64};
use nom::IResult;

/// R1_COUNTER: generation of the puzzle secret the R1 was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct R1Counter {
    pub counter: u64,
}

impl R1Counter {
    pub fn new(counter: u64) -> Self {
        R1Counter { counter }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], R1Counter> {
        let (input, _reserved) = be_u32(input)?;
        let (input, counter) = be_u64(input)?;
        Ok((input, R1Counter { counter }))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.counter.to_be_bytes());
    }
}

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// SOLUTION: the initiator's answer to a PUZZLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub k: u8,
    /// Copied from the PUZZLE.
    pub opaque: u16,
    pub random_i: [u8; 16],
    pub solution_j: [u8; 16],
}

impl Solution {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Solution> {
        let (input, k) = be_u8(input)?;
        let (input, _reserved) = be_u8(input)?;
        let (input, opaque) = be_u16(input)?;
        let (input, i) = take(16_usize)(input)?;
        let (input, j) = take(16_usize)(input)?;

        let mut random_i = [0u8; 16];
        random_i.copy_from_slice(i);
        let mut solution_j = [0u8; 16];
        solution_j.copy_from_slice(j);

        Ok((
            input,
            Solution {
                k,
                opaque,
                random_i,
                solution_j,
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.k);
        out.push(0);
        out.extend_from_slice(&self.opaque.to_be_bytes());
        out.extend_from_slice(&self.random_i);
        out.extend_from_slice(&self.solution_j);
    }
}

mod close;
mod common;
mod end_to_end;
mod retransmit;
mod simultaneous;
mod tamper;

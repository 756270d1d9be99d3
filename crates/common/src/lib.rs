// cuesync-common: shared types and wire protocol for the cuesync workspace

pub mod protocol;
pub mod textcodec;
pub mod types;

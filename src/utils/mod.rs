mod readers;
mod util;

pub use readers::{open_fasta_reader, FastaReader, FastaRecord};
pub use util::{handle_error_and_exit, Result};

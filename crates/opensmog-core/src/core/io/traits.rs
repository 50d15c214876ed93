use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading the input formats consumed by a simulation.
///
/// Each implementor handles one format-specific parser (coordinates, topology,
/// custom force descriptions) and produces a self-contained, owned model of the
/// file's contents.
pub trait InputFile {
    /// The in-memory model produced by the parser.
    type Output;

    /// The error type for parse and I/O failures.
    type Error: Error + From<io::Error>;

    /// Reads and parses the format from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error>;

    /// Reads and parses the format from a file path.
    ///
    /// Formats that reference sibling files (such as topology includes) override
    /// this to resolve paths relative to the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Output, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Parses the format from an in-memory string.
    fn read_from_str(content: &str) -> Result<Self::Output, Self::Error> {
        let mut reader = content.as_bytes();
        Self::read_from(&mut reader)
    }
}

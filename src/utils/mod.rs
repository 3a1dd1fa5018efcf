mod read_ext;

pub use self::read_ext::RecordReader;

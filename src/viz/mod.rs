pub mod rerun;

pub use self::rerun::RerunSink;

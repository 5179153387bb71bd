mod cursor;
mod input;
mod range;

pub use self::cursor::Cursor;
pub use self::input::BufferedInput;
pub use self::range::Range;

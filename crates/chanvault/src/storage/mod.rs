pub mod media;

pub use media::MediaStorage;

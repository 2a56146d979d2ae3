pub mod channels;
pub mod settings;

pub use channels::load_channel_list;
pub use settings::{Settings, DEFAULT_CHANNELS_FILE, SESSION_NAME};

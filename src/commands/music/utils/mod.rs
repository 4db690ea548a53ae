// Music playback pipeline: resolve -> queue -> fetch -> play -> advance
pub mod announcer;
pub mod fetcher;
pub mod messages;
pub mod music_manager;
pub mod player;
pub mod resolver;
pub mod sequencer;
pub mod voice;

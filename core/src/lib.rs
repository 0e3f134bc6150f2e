//! Storage core for a voice-memo app: the recordings tree, naming rules and
//! the recently-deleted staging area. See [`storage`].

pub mod storage;

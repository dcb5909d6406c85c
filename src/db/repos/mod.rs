pub mod drafts;
pub mod settings;

//! Identification prompt.
//!
//! The response parser depends on the model answering this exact prompt
//! in its usual layout. Changing the wording changes the layout.

pub const IDENTIFY_PROMPT: &str = "Identify this plant and provide its name, scientific name, brief description, the country where it is found, and any medicinal qualities.";

/// Output cap for identification replies. A full answer runs well under this.
pub const IDENTIFY_MAX_TOKENS: u32 = 1024;

/// Minimal prompt used to check that a provider key works.
pub const PING_PROMPT: &str = "Reply with just: ok";

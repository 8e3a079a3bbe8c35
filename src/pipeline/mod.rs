//! Pipeline stages for accessibility adaptation.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! can be tested on its own and the outer collaborators (model, PDF reader,
//! PDF renderer) can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompt ──▶ llm ──▶ sanitize ──▶ package
//! (request)  (text/img)  (pure)    (model)  (ammonia)    (PDF)
//! ```
//!
//! 1. [`input`]    : requests, uploads that clean up after themselves, media sniffing
//! 2. [`extract`]  : text pass-through, PDF page text, image inlining via [`encode`]
//! 3. [`prompt`]   : system instruction + profile template → `RenderedPrompt`
//! 4. [`llm`]      : one bounded model attempt; the only stage with network I/O
//! 5. [`sanitize`] : allow-list filter over untrusted model HTML
//! 6. [`package`]  : layout document → atomically written PDF artifact

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod package;
pub mod prompt;
pub mod sanitize;

// Assignment submission: attachments and notes, then an asynchronous analysis
// phase that ends in structured feedback (or a retryable failure).
// The feedback backend and file intake are collaborators behind traits.

pub mod controller;
pub mod feedback;
pub mod handlers;
pub mod intake;
pub mod models;

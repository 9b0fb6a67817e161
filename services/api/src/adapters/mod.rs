pub mod db;
pub mod mailer;
pub mod memory;
pub mod print;

pub use db::DbAdapter;
pub use mailer::{LogMailer, Outbox};
pub use memory::MemoryAdapter;
pub use print::HtmlPrintRenderer;

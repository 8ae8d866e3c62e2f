pub mod channels;
pub mod classifier;
pub mod config;
pub mod domain_utils;
pub mod duplicates;
pub mod email;
pub mod filter;
pub mod search;
pub mod statistics;
pub mod view;

pub use channels::{channel_stats, channels_by_supplier, unique_channels, ChannelSort, ChannelStat};
pub use classifier::Classifier;
pub use config::Config;
pub use duplicates::detect_duplicates;
pub use email::{Attachment, Email, EmailType, RawMessage};
pub use filter::{filter_emails, EmailFilter, FilterEngine, TimeFilter};
pub use search::{search_emails, SearchField, SearchOptions};
pub use statistics::{calculate_email_stats, out_of_hours_breakdown, EmailStats};
pub use view::{ingest, sort_emails, MailboxView, SortField, SortOrder};

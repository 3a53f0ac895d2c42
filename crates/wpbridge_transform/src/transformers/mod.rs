//! Built-in transformers.
//!
//! Every rewrite here produces output its own pattern no longer matches, so
//! running a transformer twice gives the same result as running it once.

mod global_to_container;
mod global_variable;
mod output_buffer;
mod replace;
mod woocommerce;
mod wp_options;
mod wpdb_direct_query;

pub use global_to_container::GlobalToContainerTransformer;
pub use global_variable::GlobalVariableTransformer;
pub use output_buffer::OutputBufferTransformer;
pub use replace::{RegexTransformer, ReplaceTransformer};
pub use woocommerce::WooCommerceOrderTransformer;
pub use wp_options::{OPTION_FUNCTIONS, WpOptionsTransformer};
pub use wpdb_direct_query::WpdbDirectQueryTransformer;

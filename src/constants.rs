/// User-Agent sent with every upstream request.
pub const USER_AGENT: &str = "hn-alerts/0.1";

/// Base URL for links to items on the content platform.
pub const HN_ITEM_URL_BASE: &str = "https://news.ycombinator.com/item";

/// Hits requested per Algolia search page.
pub const SEARCH_HITS_PER_PAGE: u32 = 100;

/// Maximum excerpt length (chars) after markup stripping.
pub const EXCERPT_MAX_CHARS: usize = 400;

//! Quote Page Extraction
//!
//! Turns a rendered quote page into a typed snapshot. Extraction is anchored
//! on the page's class names:
//!
//! | Field            | Anchor                                   |
//! |------------------|------------------------------------------|
//! | name             | `class="zzDege"`                         |
//! | price            | `class="YMlKec fxKbKc"`                  |
//! | stat row label   | `class="mfs7Fc"`                         |
//! | stat row value   | `class="P6K39c"` (next after the label)  |
//! | description      | `<meta name="description" content=...>`  |
//! | search link      | `<a href=".../quote/SYM:EXCH">`          |
//! | search ticker    | `class="COaKTb"` (inside the link)       |
//! | search name      | `class="ZvmM7"` (inside the link)        |

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::application::ports::FetchError;
use crate::domain::instrument::InstrumentKey;
use crate::domain::search::SearchResult;
use crate::domain::snapshot::{CryptoSnapshot, Snapshot, StockSnapshot, price_change};

// Stat row labels
const PREVIOUS_CLOSE: &str = "Previous close";
const DAY_RANGE: &str = "Day range";
const YEAR_RANGE: &str = "Year range";
const MARKET_CAP: &str = "Market cap";
const VOLUME: &str = "Volume";
const AVG_VOLUME: &str = "Avg Volume";
const PE_RATIO: &str = "P/E ratio";
const PRIMARY_EXCHANGE: &str = "Primary exchange";

struct Patterns {
    name: Regex,
    price: Regex,
    stat_row: Regex,
    description: Regex,
    search_link: Regex,
    search_ticker: Regex,
    search_name: Regex,
}

#[allow(clippy::expect_used)] // Patterns are compile-time constants
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();

    PATTERNS.get_or_init(|| Patterns {
        name: Regex::new(r#"class="zzDege"[^>]*>([^<]+)<"#).expect("name regex is valid"),
        price: Regex::new(r#"class="YMlKec fxKbKc"[^>]*>([^<]+)<"#)
            .expect("price regex is valid"),
        stat_row: Regex::new(r#"(?s)class="mfs7Fc"[^>]*>([^<]+)<.*?class="P6K39c"[^>]*>([^<]*)<"#)
            .expect("stat row regex is valid"),
        description: Regex::new(r#"<meta\s+name="description"\s+content="([^"]*)""#)
            .expect("description regex is valid"),
        search_link: Regex::new(r#"(?s)<a\b[^>]*\bhref="([^"]*/quote/[^"]*)"[^>]*>(.*?)</a>"#)
            .expect("search link regex is valid"),
        search_ticker: Regex::new(r#"class="COaKTb"[^>]*>([^<]*)<"#)
            .expect("search ticker regex is valid"),
        search_name: Regex::new(r#"class="ZvmM7"[^>]*>([^<]*)<"#)
            .expect("search name regex is valid"),
    })
}

// =============================================================================
// Snapshots
// =============================================================================

/// Extract an equity snapshot.
///
/// # Errors
///
/// [`FetchError::NotFound`] when the page has no instrument name,
/// [`FetchError::Parse`] when the price is missing or unparsable.
pub fn stock_snapshot(key: &InstrumentKey, html: &str) -> Result<Snapshot, FetchError> {
    let page = Page::read(key, html)?;
    let stats = page.stats;
    let stat = |label: &str| stats.get(label).cloned().unwrap_or_default();

    let previous_close = stats
        .get(PREVIOUS_CLOSE)
        .and_then(|v| parse_decimal(v))
        .unwrap_or_default();
    let (change, change_percent) = price_change(page.price, previous_close);

    let volume = stats
        .get(VOLUME)
        .or_else(|| stats.get(AVG_VOLUME))
        .cloned()
        .unwrap_or_default();

    Ok(Snapshot::Stock(StockSnapshot {
        stock_name: page.name,
        price: page.price,
        previous_close,
        change,
        change_percent,
        day_range: stat(DAY_RANGE),
        year_range: stat(YEAR_RANGE),
        volume,
        market_cap: stat(MARKET_CAP),
        pe_ratio: stats.get(PE_RATIO).and_then(|v| parse_decimal(v)),
        primary_exchange: stat(PRIMARY_EXCHANGE),
    }))
}

/// Extract a crypto snapshot.
///
/// # Errors
///
/// Same as [`stock_snapshot`].
pub fn crypto_snapshot(key: &InstrumentKey, html: &str) -> Result<Snapshot, FetchError> {
    let page = Page::read(key, html)?;

    let previous_close = page
        .stats
        .get(PREVIOUS_CLOSE)
        .and_then(|v| parse_decimal(v))
        .unwrap_or_default();
    let (change, change_percent) = price_change(page.price, previous_close);

    let description = patterns()
        .description
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default();

    Ok(Snapshot::Crypto(CryptoSnapshot {
        crypto_name: page.name,
        description,
        price: page.price,
        previous_close,
        change,
        change_percent,
    }))
}

// =============================================================================
// Search
// =============================================================================

/// Every distinct instrument a page links to, in page order.
///
/// Links without both a symbol and a name are skipped. Index links show
/// `Index` as their symbol, so the symbol from the link target is used
/// instead.
#[must_use]
pub fn search_results(html: &str) -> Vec<SearchResult> {
    let p = patterns();
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for cap in p.search_link.captures_iter(html) {
        let (Some(href), Some(inner)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let (Some(mut ticker), Some(name)) = (
            first_capture(&p.search_ticker, inner.as_str()),
            first_capture(&p.search_name, inner.as_str()),
        ) else {
            continue;
        };
        if ticker.is_empty() || name.is_empty() {
            continue;
        }

        let (link_symbol, exchange) = split_quote_target(href.as_str());
        if ticker == "Index" && !link_symbol.is_empty() {
            ticker = link_symbol.to_string();
        }

        let result = SearchResult {
            ticker,
            name,
            exchange: exchange.to_string(),
        };
        if seen.insert((result.ticker.clone(), result.exchange.clone())) {
            results.push(result);
        }
    }
    results
}

/// `./quote/TSLA:NASDAQ` → (`TSLA`, `NASDAQ`); `./quote/BTC-USD` → (`BTC`, `USD`).
fn split_quote_target(href: &str) -> (&str, &str) {
    let segment = href.rsplit('/').next().unwrap_or_default();
    let segment = segment.split(['?', '#']).next().unwrap_or_default();
    segment
        .split_once(':')
        .or_else(|| segment.split_once('-'))
        .unwrap_or(("", ""))
}

struct Page {
    name: String,
    price: Decimal,
    stats: HashMap<String, String>,
}

impl Page {
    fn read(key: &InstrumentKey, html: &str) -> Result<Self, FetchError> {
        let p = patterns();

        let name = first_capture(&p.name, html)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FetchError::NotFound(key.to_string()))?;

        let raw_price = first_capture(&p.price, html).ok_or_else(|| FetchError::Parse {
            key: key.to_string(),
            reason: "price not found".to_string(),
        })?;
        let price = parse_decimal(&raw_price).ok_or_else(|| FetchError::Parse {
            key: key.to_string(),
            reason: format!("unparsable price {raw_price:?}"),
        })?;

        Ok(Self {
            name,
            price,
            stats: stat_rows(html),
        })
    }
}

fn first_capture(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
}

/// Label → value for every stat row; the first occurrence of a label wins.
fn stat_rows(html: &str) -> HashMap<String, String> {
    let mut rows = HashMap::new();
    for cap in patterns().stat_row.captures_iter(html) {
        let (Some(label), Some(value)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        rows.entry(clean_text(label.as_str()))
            .or_insert_with(|| clean_text(value.as_str()));
    }
    rows
}

// =============================================================================
// Text Helpers
// =============================================================================

/// Parse a page-rendered number, ignoring currency symbols, thousands
/// separators, percent signs and whitespace.
///
/// Returns `None` when no digits remain.
#[must_use]
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Decode the handful of entities the pages use and collapse whitespace.
fn clean_text(raw: &str) -> String {
    let decoded = raw
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use test_case::test_case;

    use super::*;

    pub(crate) fn stock_page(name: &str, price: &str, previous_close: &str) -> String {
        format!(
            r#"<html><head><meta name="description" content="Stock quote"></head><body>
<div class="zzDege">{name}</div>
<div class="YMlKec fxKbKc">{price}</div>
<div class="gyFHrc"><span class="mfs7Fc">Previous close</span><div class="P6K39c">{previous_close}</div></div>
<div class="gyFHrc"><span class="mfs7Fc">Day range</span><div class="P6K39c">$178.20 - $186.40</div></div>
<div class="gyFHrc"><span class="mfs7Fc">Year range</span><div class="P6K39c">$138.80 - $299.29</div></div>
<div class="gyFHrc"><span class="mfs7Fc">Market cap</span><div class="P6K39c">580.12B USD</div></div>
<div class="gyFHrc"><span class="mfs7Fc">Avg Volume</span><div class="P6K39c">98.12M</div></div>
<div class="gyFHrc"><span class="mfs7Fc">P/E ratio</span><div class="P6K39c">45.31</div></div>
<div class="gyFHrc"><span class="mfs7Fc">Primary exchange</span><div class="P6K39c">NASDAQ</div></div>
</body></html>"#
        )
    }

    pub(crate) fn crypto_page(name: &str, price: &str, previous_close: &str) -> String {
        format!(
            r#"<html><head><meta name="description" content="Get the latest Bitcoin to United States Dollar (BTC / USD) real-time quote"></head><body>
<div class="zzDege">{name}</div>
<div class="YMlKec fxKbKc">{price}</div>
<div class="gyFHrc"><span class="mfs7Fc">Previous close</span><div class="P6K39c">{previous_close}</div></div>
</body></html>"#
        )
    }

    pub(crate) fn search_page() -> String {
        r#"<html><body>
<a href="./news">News</a>
<a class="FAOWbb" href="./quote/TSLA:NASDAQ"><div class="COaKTb">TSLA</div><div class="ZvmM7">Tesla Inc</div></a>
<a class="FAOWbb" href="./quote/.DJI:INDEXDJX"><div class="COaKTb">Index</div><div class="ZvmM7">Dow Jones Industrial Average</div></a>
<a class="FAOWbb" href="./quote/TSLA:NASDAQ"><div class="COaKTb">TSLA</div><div class="ZvmM7">Tesla Inc</div></a>
<a class="FAOWbb" href="./quote/X:Y"><div class="COaKTb">X</div></a>
<a class="FAOWbb" href="./quote/BTC-USD?hl=en"><div class="COaKTb">BTC</div><div class="ZvmM7">Bitcoin (BTC / USD)</div></a>
</body></html>"#
            .to_string()
    }

    fn key(raw: &str) -> InstrumentKey {
        InstrumentKey::parse(raw).unwrap()
    }

    #[test_case("$182.50", "182.50" ; "dollar")]
    #[test_case("₹2,945.10", "2945.10" ; "rupee with separator")]
    #[test_case("65,012.34", "65012.34" ; "thousands")]
    #[test_case("−1.25%", "-1.25" ; "unicode minus percent")]
    #[test_case(" 45.31 ", "45.31" ; "padded")]
    fn parse_decimal_strips_formatting(raw: &str, expected: &str) {
        assert_eq!(parse_decimal(raw), Some(Decimal::from_str(expected).unwrap()));
    }

    #[test_case("" ; "empty")]
    #[test_case("-" ; "dash only")]
    #[test_case("N/A" ; "not available")]
    fn parse_decimal_rejects_non_numbers(raw: &str) {
        assert_eq!(parse_decimal(raw), None);
    }

    #[test]
    fn stock_page_extracts_all_fields() {
        let html = stock_page("Tesla Inc", "$182.50", "$180.00");
        let Snapshot::Stock(s) = stock_snapshot(&key("TSLA:NASDAQ"), &html).unwrap() else {
            panic!("expected stock snapshot");
        };

        assert_eq!(s.stock_name, "Tesla Inc");
        assert_eq!(s.price, Decimal::from_str("182.50").unwrap());
        assert_eq!(s.previous_close, Decimal::from_str("180.00").unwrap());
        assert_eq!(s.change, Decimal::from_str("2.50").unwrap());
        assert_eq!(s.change_percent, Decimal::from_str("1.3889").unwrap());
        assert_eq!(s.day_range, "$178.20 - $186.40");
        assert_eq!(s.volume, "98.12M");
        assert_eq!(s.market_cap, "580.12B USD");
        assert_eq!(s.pe_ratio, Some(Decimal::from_str("45.31").unwrap()));
        assert_eq!(s.primary_exchange, "NASDAQ");
    }

    #[test]
    fn crypto_page_extracts_description() {
        let html = crypto_page("Bitcoin (BTC / USD)", "65,000.00", "64,000.00");
        let Snapshot::Crypto(c) = crypto_snapshot(&key("BTC-USD"), &html).unwrap() else {
            panic!("expected crypto snapshot");
        };

        assert_eq!(c.crypto_name, "Bitcoin (BTC / USD)");
        assert!(c.description.starts_with("Get the latest Bitcoin"));
        assert_eq!(c.change, Decimal::from_str("1000.00").unwrap());
        assert_eq!(c.change_percent, Decimal::from_str("1.5625").unwrap());
    }

    #[test]
    fn missing_name_is_not_found() {
        let err = stock_snapshot(&key("NOPE:NOWHERE"), "<html></html>").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unparsable_price_is_parse_error() {
        let html = stock_page("Tesla Inc", "N/A", "$180.00");
        let err = stock_snapshot(&key("TSLA:NASDAQ"), &html).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }

    #[test]
    fn missing_previous_close_yields_zero_percent() {
        let html = r#"<div class="zzDege">Thing</div><div class="YMlKec fxKbKc">10</div>"#;
        let Snapshot::Stock(s) = stock_snapshot(&key("X:Y"), html).unwrap() else {
            panic!("expected stock snapshot");
        };
        assert_eq!(s.previous_close, Decimal::ZERO);
        assert_eq!(s.change_percent, Decimal::ZERO);
        assert_eq!(s.pe_ratio, None);
    }

    #[test]
    fn search_results_from_quote_links() {
        let results = search_results(&search_page());

        let found: Vec<(&str, &str, &str)> = results
            .iter()
            .map(|r| (r.ticker.as_str(), r.name.as_str(), r.exchange.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("TSLA", "Tesla Inc", "NASDAQ"),
                (".DJI", "Dow Jones Industrial Average", "INDEXDJX"),
                ("BTC", "Bitcoin (BTC / USD)", "USD"),
            ]
        );
    }

    #[test]
    fn search_results_empty_without_links() {
        assert!(search_results("<html><a href=\"./about\">About</a></html>").is_empty());
    }

    #[test_case("./quote/TSLA:NASDAQ", ("TSLA", "NASDAQ") ; "equity")]
    #[test_case("./quote/ETH-EUR", ("ETH", "EUR") ; "crypto")]
    #[test_case("./quote/", ("", "") ; "empty")]
    fn quote_target_is_split(href: &str, expected: (&str, &str)) {
        assert_eq!(split_quote_target(href), expected);
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(clean_text("AT&amp;T  Inc&#39;s\n"), "AT&T Inc's");
    }
}

//! Symbol normalization: raw platform tickers to canonical asset identities.
//!
//! Classification is pattern-based and heuristic. Venue prefixes and the optional
//! instrument hint bias the outcome; the hint is authoritative when present.
//! Normalization never fails: anything unrecognized comes back with
//! `supported = false` and a rejection reason.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{AssetClass, ProviderId, ValidationError};

/// Default pip/tick unit value: one account-currency unit per tick per unit
/// of quantity.
pub const UNIT_TICK_VALUE: f64 = 1.0;

const ISO_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "AUD", "NZD", "CAD", "CHF", "SEK", "NOK", "DKK", "SGD", "HKD",
    "MXN", "ZAR", "TRY", "PLN", "CZK", "HUF", "CNH", "CNY", "THB", "ILS", "KRW", "INR", "BRL",
];

const CRYPTO_BASES: &[&str] = &[
    "BTC", "XBT", "ETH", "SOL", "ADA", "XRP", "DOT", "DOGE", "SHIB", "LTC", "BCH", "LINK", "AVAX",
    "MATIC", "BNB", "UNI", "ATOM", "TRX", "ETC", "XLM", "NEAR", "APT", "ARB", "OP", "PEPE", "SUI",
    "FIL", "ALGO", "AAVE", "INJ",
];

const CRYPTO_QUOTES: &[&str] = &[
    "USDT", "USDC", "BUSD", "TUSD", "DAI", "USD", "EUR", "GBP", "BTC", "ETH",
];

const STABLECOIN_QUOTES: &[&str] = &["USDT", "USDC", "BUSD", "TUSD", "DAI"];

const METAL_BASES: &[&str] = &["XAU", "XAG", "XPT", "XPD"];

const FOREX_VENUES: &[&str] = &["OANDA", "FX", "FX_IDC", "FOREXCOM", "FXCM", "PEPPERSTONE", "ICMARKETS"];
const CRYPTO_VENUES: &[&str] = &[
    "BINANCE", "COINBASE", "KRAKEN", "BITSTAMP", "BYBIT", "KUCOIN", "OKX", "GEMINI", "BITFINEX",
];
const STOCK_VENUES: &[&str] = &["NASDAQ", "NYSE", "AMEX", "ARCA", "BATS", "LSE", "XETRA"];
const FUTURES_VENUES: &[&str] = &["CME", "CBOT", "NYMEX", "COMEX", "CME_MINI", "EUREX", "ICEUS"];

const FUTURES_MONTH_CODES: &[char] = &['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// `(keyword, yahoo ticker)` pairs for the index CFD names retail platforms
/// use. Polygon's free tier has no index endpoint, so only Yahoo maps.
const INDEX_TICKERS: &[(&str, &str)] = &[
    ("US30", "^DJI"),
    ("DJ30", "^DJI"),
    ("DOW", "^DJI"),
    ("SPX", "^GSPC"),
    ("SPX500", "^GSPC"),
    ("US500", "^GSPC"),
    ("SP500", "^GSPC"),
    ("NAS100", "^NDX"),
    ("NDX", "^NDX"),
    ("USTEC", "^NDX"),
    ("US100", "^NDX"),
    ("US2000", "^RUT"),
    ("GER30", "^GDAXI"),
    ("GER40", "^GDAXI"),
    ("DAX", "^GDAXI"),
    ("UK100", "^FTSE"),
    ("FTSE", "^FTSE"),
    ("FRA40", "^FCHI"),
    ("CAC40", "^FCHI"),
    ("JPN225", "^N225"),
    ("NIKKEI", "^N225"),
    ("AUS200", "^AXJO"),
    ("HK50", "^HSI"),
    ("EU50", "^STOXX50E"),
    ("STOXX50", "^STOXX50E"),
    ("VIX", "^VIX"),
];

/// `(keyword, yahoo ticker)` pairs for spot/CFD commodity names.
const COMMODITY_TICKERS: &[(&str, &str)] = &[
    ("USOIL", "CL=F"),
    ("WTI", "CL=F"),
    ("OIL", "CL=F"),
    ("UKOIL", "BZ=F"),
    ("BRENT", "BZ=F"),
    ("NATGAS", "NG=F"),
    ("XNGUSD", "NG=F"),
    ("COPPER", "HG=F"),
    ("WHEAT", "ZW=F"),
    ("CORN", "ZC=F"),
    ("SOYBEAN", "ZS=F"),
    ("SUGAR", "SB=F"),
    ("COFFEE", "KC=F"),
    ("COCOA", "CC=F"),
    ("COTTON", "CT=F"),
];

/// Instrument-type hint supplied by an ingestion source. Authoritative over
/// pattern detection when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentHint {
    Forex,
    Crypto,
    Stock,
    Metal,
    Index,
    Commodity,
    Futures,
    Option,
}

impl InstrumentHint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forex => "forex",
            Self::Crypto => "crypto",
            Self::Stock => "stock",
            Self::Metal => "metal",
            Self::Index => "index",
            Self::Commodity => "commodity",
            Self::Futures => "futures",
            Self::Option => "option",
        }
    }
}

impl Display for InstrumentHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentHint {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "forex" | "fx" | "currency" => Ok(Self::Forex),
            "crypto" | "cryptocurrency" => Ok(Self::Crypto),
            "stock" | "stocks" | "equity" | "shares" => Ok(Self::Stock),
            "metal" | "metals" => Ok(Self::Metal),
            "index" | "indices" => Ok(Self::Index),
            "commodity" | "commodities" => Ok(Self::Commodity),
            "futures" | "future" => Ok(Self::Futures),
            "option" | "options" => Ok(Self::Option),
            other => Err(ValidationError::InvalidHint {
                value: other.to_owned(),
            }),
        }
    }
}

/// Canonical identity derived from a raw platform ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSymbol {
    /// Raw input as received.
    pub original: String,
    /// Canonical identity used as the ledger key, e.g. `EURUSD`, `BTCUSDT`,
    /// `AAPL`, `US30`.
    pub identity: String,
    pub asset_class: AssetClass,
    pub base: Option<String>,
    pub quote: Option<String>,
    /// Minimum quoted increment used for pip/tick PnL.
    pub tick_size: f64,
    /// Account-currency value of one tick per unit of quantity.
    pub tick_value: f64,
    pub supported: bool,
    /// Why the symbol is unsupported, when it is.
    pub rejection: Option<String>,
}

impl NormalizedSymbol {
    fn unsupported(original: &str, identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            original: original.to_owned(),
            identity: identity.into(),
            asset_class: AssetClass::Unsupported,
            base: None,
            quote: None,
            tick_size: 0.01,
            tick_value: UNIT_TICK_VALUE,
            supported: false,
            rejection: Some(reason.into()),
        }
    }

    fn pair(
        original: &str,
        asset_class: AssetClass,
        base: String,
        quote: String,
        tick_size: f64,
    ) -> Self {
        Self {
            original: original.to_owned(),
            identity: format!("{base}{quote}"),
            asset_class,
            base: Some(base),
            quote: Some(quote),
            tick_size,
            tick_value: UNIT_TICK_VALUE,
            supported: true,
            rejection: None,
        }
    }

    fn single(original: &str, identity: String, asset_class: AssetClass, tick_size: f64) -> Self {
        Self {
            original: original.to_owned(),
            identity,
            asset_class,
            base: None,
            quote: None,
            tick_size,
            tick_value: UNIT_TICK_VALUE,
            supported: true,
            rejection: None,
        }
    }

    /// Quote currency with exchange stablecoins folded into USD, which is
    /// what both providers price against.
    fn effective_quote(&self) -> Option<&str> {
        let quote = self.quote.as_deref()?;
        if STABLECOIN_QUOTES.contains(&quote) {
            Some("USD")
        } else {
            Some(quote)
        }
    }

    /// The ticker this identity resolves to on a given provider, or `None`
    /// when the provider cannot serve the asset class.
    pub fn provider_symbol(&self, provider: ProviderId) -> Option<String> {
        match (provider, self.asset_class) {
            (ProviderId::Polygon, AssetClass::Forex | AssetClass::Metal) => {
                Some(format!("C:{}{}", self.base.as_deref()?, self.quote.as_deref()?))
            }
            (ProviderId::Polygon, AssetClass::Crypto) => {
                Some(format!("X:{}{}", self.base.as_deref()?, self.effective_quote()?))
            }
            (ProviderId::Polygon, AssetClass::Stock) => Some(self.identity.clone()),
            (ProviderId::Polygon, _) => None,
            (ProviderId::Yahoo, AssetClass::Forex | AssetClass::Metal) => {
                Some(format!("{}{}=X", self.base.as_deref()?, self.quote.as_deref()?))
            }
            (ProviderId::Yahoo, AssetClass::Crypto) => {
                Some(format!("{}-{}", self.base.as_deref()?, self.effective_quote()?))
            }
            (ProviderId::Yahoo, AssetClass::Stock) => Some(self.identity.clone()),
            (ProviderId::Yahoo, AssetClass::Index) => {
                lookup(INDEX_TICKERS, &self.identity).map(str::to_owned)
            }
            (ProviderId::Yahoo, AssetClass::Commodity) => {
                lookup(COMMODITY_TICKERS, &self.identity).map(str::to_owned)
            }
            (ProviderId::Yahoo, AssetClass::Unsupported) => None,
        }
    }
}

fn lookup<'a>(table: &'a [(&str, &str)], key: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(keyword, _)| *keyword == key)
        .map(|(_, ticker)| *ticker)
}

fn forex_tick_size(quote: &str) -> f64 {
    if quote == "JPY" {
        0.01
    } else {
        0.0001
    }
}

fn metal_tick_size(base: &str) -> f64 {
    if base == "XAU" {
        0.1
    } else {
        0.01
    }
}

/// Venue class implied by an exchange prefix, when recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VenueBias {
    Forex,
    Crypto,
    Stock,
    Futures,
}

fn venue_bias(prefix: &str) -> Option<VenueBias> {
    if FOREX_VENUES.contains(&prefix) {
        Some(VenueBias::Forex)
    } else if CRYPTO_VENUES.contains(&prefix) {
        Some(VenueBias::Crypto)
    } else if STOCK_VENUES.contains(&prefix) {
        Some(VenueBias::Stock)
    } else if FUTURES_VENUES.contains(&prefix) {
        Some(VenueBias::Futures)
    } else {
        None
    }
}

fn is_iso_currency(code: &str) -> bool {
    ISO_CURRENCIES.contains(&code)
}

fn split_pair(cleaned: &str) -> Option<(String, String)> {
    for delimiter in ['/', '-', '_'] {
        if let Some((base, quote)) = cleaned.split_once(delimiter) {
            if (2..=5).contains(&base.len())
                && (2..=5).contains(&quote.len())
                && base.chars().all(|c| c.is_ascii_alphanumeric())
                && quote.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Some((base.to_owned(), quote.to_owned()));
            }
        }
    }
    None
}

/// Root + month code + one/two digit year, e.g. `ESZ4`, `CLX24`, `NQH25`.
fn looks_like_futures_contract(cleaned: &str) -> bool {
    let digits = cleaned.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if !(1..=2).contains(&digits) {
        return false;
    }
    let head = &cleaned[..cleaned.len() - digits];
    let Some(month) = head.chars().last() else {
        return false;
    };
    let root_len = head.len() - 1;
    (1..=3).contains(&root_len)
        && FUTURES_MONTH_CODES.contains(&month)
        && head[..root_len].chars().all(|c| c.is_ascii_alphabetic())
}

fn classify_pair(original: &str, base: String, quote: String) -> NormalizedSymbol {
    if METAL_BASES.contains(&base.as_str()) {
        let tick = metal_tick_size(&base);
        return NormalizedSymbol::pair(original, AssetClass::Metal, base, quote, tick);
    }
    if is_iso_currency(&base) && is_iso_currency(&quote) {
        let tick = forex_tick_size(&quote);
        return NormalizedSymbol::pair(original, AssetClass::Forex, base, quote, tick);
    }
    if CRYPTO_BASES.contains(&base.as_str()) || CRYPTO_QUOTES.contains(&quote.as_str()) {
        return NormalizedSymbol::pair(original, AssetClass::Crypto, base, quote, 0.01);
    }
    NormalizedSymbol::unsupported(
        original,
        format!("{base}{quote}"),
        format!("unrecognized pair '{base}/{quote}'"),
    )
}

/// Compact crypto pair like `BTCUSDT`: known base prefix with a recognized
/// quote suffix.
fn split_compact_crypto(cleaned: &str) -> Option<(String, String)> {
    for quote in CRYPTO_QUOTES {
        if let Some(base) = cleaned.strip_suffix(quote) {
            if base.len() >= 2 && CRYPTO_BASES.contains(&base) {
                return Some((base.to_owned(), (*quote).to_owned()));
            }
        }
    }
    None
}

/// Compact crypto pair under a crypto venue prefix, where the base does not
/// need to be in the known-base table (`BINANCE:FOOUSDT` is still crypto).
fn split_venue_crypto(cleaned: &str) -> Option<(String, String)> {
    for quote in CRYPTO_QUOTES {
        if let Some(base) = cleaned.strip_suffix(quote) {
            if (2..=6).contains(&base.len()) && base.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Some((base.to_owned(), (*quote).to_owned()));
            }
        }
    }
    None
}

fn classify_with_hint(original: &str, cleaned: &str, hint: InstrumentHint) -> NormalizedSymbol {
    match hint {
        InstrumentHint::Futures | InstrumentHint::Option => NormalizedSymbol::unsupported(
            original,
            cleaned,
            format!("{hint} symbols are not supported"),
        ),
        InstrumentHint::Forex => {
            let pair = split_pair(cleaned).or_else(|| {
                (cleaned.len() == 6).then(|| (cleaned[..3].to_owned(), cleaned[3..].to_owned()))
            });
            match pair {
                Some((base, quote)) => {
                    let tick = forex_tick_size(&quote);
                    NormalizedSymbol::pair(original, AssetClass::Forex, base, quote, tick)
                }
                // Hint wins on class even when the pair shape is opaque; the
                // gateway simply has no ticker to query.
                None => NormalizedSymbol::single(
                    original,
                    cleaned.to_owned(),
                    AssetClass::Forex,
                    0.0001,
                ),
            }
        }
        InstrumentHint::Metal => {
            let (base, quote) = split_pair(cleaned).unwrap_or_else(|| {
                if cleaned.len() >= 6 {
                    (cleaned[..3].to_owned(), cleaned[3..].to_owned())
                } else {
                    (cleaned.to_owned(), String::from("USD"))
                }
            });
            let tick = metal_tick_size(&base);
            NormalizedSymbol::pair(original, AssetClass::Metal, base, quote, tick)
        }
        InstrumentHint::Crypto => {
            let pair = split_pair(cleaned)
                .or_else(|| split_compact_crypto(cleaned))
                .or_else(|| split_venue_crypto(cleaned));
            match pair {
                Some((base, quote)) => {
                    NormalizedSymbol::pair(original, AssetClass::Crypto, base, quote, 0.01)
                }
                None => NormalizedSymbol::pair(
                    original,
                    AssetClass::Crypto,
                    cleaned.to_owned(),
                    String::from("USD"),
                    0.01,
                ),
            }
        }
        InstrumentHint::Stock => {
            NormalizedSymbol::single(original, cleaned.to_owned(), AssetClass::Stock, 0.01)
        }
        InstrumentHint::Index => {
            NormalizedSymbol::single(original, cleaned.to_owned(), AssetClass::Index, 0.01)
        }
        InstrumentHint::Commodity => {
            NormalizedSymbol::single(original, cleaned.to_owned(), AssetClass::Commodity, 0.01)
        }
    }
}

/// Classify a raw ticker. Pure and deterministic; never fails.
pub fn classify(raw: &str, hint: Option<InstrumentHint>) -> NormalizedSymbol {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NormalizedSymbol::unsupported(raw, "", "empty symbol");
    }

    let upper = trimmed.to_ascii_uppercase();
    // Classification slices on byte offsets; anything non-ASCII is not a
    // ticker either provider can serve.
    if !upper.is_ascii() {
        return NormalizedSymbol::unsupported(
            raw,
            upper,
            format!("unrecognized symbol format '{trimmed}'"),
        );
    }
    let (bias, cleaned) = match upper.split_once(':') {
        Some((prefix, rest)) if !rest.is_empty() => (venue_bias(prefix), rest.to_owned()),
        Some((_, _)) => (None, upper.clone()),
        None => (None, upper.clone()),
    };

    if let Some(hint) = hint {
        return classify_with_hint(raw, &cleaned, hint);
    }

    if let Some((base, quote)) = split_pair(&cleaned) {
        return classify_pair(raw, base, quote);
    }

    if cleaned.len() >= 6 && METAL_BASES.contains(&&cleaned[..3]) {
        let base = cleaned[..3].to_owned();
        let quote = cleaned[3..].to_owned();
        let tick = metal_tick_size(&base);
        return NormalizedSymbol::pair(raw, AssetClass::Metal, base, quote, tick);
    }

    // Keyword tables win over the futures heuristic: index CFD names like
    // HK50 or EU50 would otherwise parse as root + month code + year.
    if lookup(INDEX_TICKERS, &cleaned).is_some() {
        return NormalizedSymbol::single(raw, cleaned, AssetClass::Index, 0.01);
    }

    if lookup(COMMODITY_TICKERS, &cleaned).is_some() {
        return NormalizedSymbol::single(raw, cleaned, AssetClass::Commodity, 0.01);
    }

    if bias == Some(VenueBias::Futures) || looks_like_futures_contract(&cleaned) {
        return NormalizedSymbol::unsupported(
            raw,
            cleaned,
            "futures and options symbols are not supported",
        );
    }

    if cleaned.len() == 6
        && is_iso_currency(&cleaned[..3])
        && is_iso_currency(&cleaned[3..])
        && bias != Some(VenueBias::Crypto)
        && bias != Some(VenueBias::Stock)
    {
        let base = cleaned[..3].to_owned();
        let quote = cleaned[3..].to_owned();
        let tick = forex_tick_size(&quote);
        return NormalizedSymbol::pair(raw, AssetClass::Forex, base, quote, tick);
    }

    if let Some((base, quote)) = split_compact_crypto(&cleaned) {
        return NormalizedSymbol::pair(raw, AssetClass::Crypto, base, quote, 0.01);
    }

    if bias == Some(VenueBias::Crypto) {
        if let Some((base, quote)) = split_venue_crypto(&cleaned) {
            return NormalizedSymbol::pair(raw, AssetClass::Crypto, base, quote, 0.01);
        }
        return NormalizedSymbol::pair(raw, AssetClass::Crypto, cleaned, String::from("USD"), 0.01);
    }

    if (1..=5).contains(&cleaned.len()) && cleaned.chars().all(|c| c.is_ascii_alphabetic()) {
        return NormalizedSymbol::single(raw, cleaned, AssetClass::Stock, 0.01);
    }

    NormalizedSymbol::unsupported(raw, cleaned, format!("unrecognized symbol format '{trimmed}'"))
}

/// Memoizing wrapper around [`classify`].
///
/// Normalization is pure and hit constantly (every fill and every
/// verification leg), so results are cached by `(raw, hint)`. The cache is an
/// explicit component so callers share one instance instead of a process
/// global.
#[derive(Debug, Default)]
pub struct SymbolNormalizer {
    cache: Mutex<HashMap<(String, Option<InstrumentHint>), NormalizedSymbol>>,
}

impl SymbolNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, raw: &str, hint: Option<InstrumentHint>) -> NormalizedSymbol {
        let key = (raw.to_owned(), hint);
        let mut cache = self
            .cache
            .lock()
            .expect("symbol cache lock should not be poisoned");
        cache
            .entry(key)
            .or_insert_with(|| classify(raw, hint))
            .clone()
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .expect("symbol cache lock should not be poisoned")
            .len()
    }
}

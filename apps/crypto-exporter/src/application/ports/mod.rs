//! Port Interfaces
//!
//! ## Driven Ports (Outbound)
//!
//! - `ExchangeAdapter`: one exchange's REST API behind a uniform capability
//!   interface (symbols, tickers, balances)
//! - `MetricSink`: where a finished poll result goes (snapshot, text file)

mod exchange_port;
mod sink_port;

pub use exchange_port::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode,
};
pub use sink_port::{MetricSink, SinkError};

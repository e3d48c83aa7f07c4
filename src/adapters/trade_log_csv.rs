//! CSV export of a simulation trade log.

use crate::domain::error::DevscanError;
use crate::domain::simulator::TradeEvent;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct TradeRow {
    side: &'static str,
    time: String,
    price: f64,
    quantity: u64,
    deviation: f64,
    held_after: Option<u64>,
    pnl: Option<f64>,
}

impl From<&TradeEvent> for TradeRow {
    fn from(event: &TradeEvent) -> Self {
        match event {
            TradeEvent::Buy {
                time,
                price,
                quantity,
                deviation,
                held_after,
            } => TradeRow {
                side: "BUY",
                time: time.to_string(),
                price: *price,
                quantity: *quantity,
                deviation: *deviation,
                held_after: Some(*held_after),
                pnl: None,
            },
            TradeEvent::Sell {
                time,
                price,
                quantity,
                pnl,
                deviation,
            } => TradeRow {
                side: "SELL",
                time: time.to_string(),
                price: *price,
                quantity: *quantity,
                deviation: *deviation,
                held_after: Some(0),
                pnl: Some(*pnl),
            },
        }
    }
}

/// Columns: side,time,price,quantity,deviation,held_after,pnl
pub fn write_trade_log<W: Write>(writer: W, trades: &[TradeEvent]) -> Result<(), DevscanError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if trades.is_empty() {
        wtr.write_record(["side", "time", "price", "quantity", "deviation", "held_after", "pnl"])?;
    }
    for trade in trades {
        wtr.serialize(TradeRow::from(trade))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trade_log_file(path: &Path, trades: &[TradeEvent]) -> Result<(), DevscanError> {
    let file = std::fs::File::create(path)?;
    write_trade_log(file, trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::period::PeriodTime;

    fn render(trades: &[TradeEvent]) -> String {
        let mut buf = Vec::new();
        write_trade_log(&mut buf, trades).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn writes_buy_and_sell_rows() {
        let trades = vec![
            TradeEvent::Buy {
                time: PeriodTime::Label("2024-01".into()),
                price: 100.0,
                quantity: 10,
                deviation: -35.0,
                held_after: 10,
            },
            TradeEvent::Sell {
                time: PeriodTime::Label("2024-02".into()),
                price: 110.0,
                quantity: 10,
                pnl: 100.0,
                deviation: 31.5,
            },
        ];
        let out = render(&trades);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "side,time,price,quantity,deviation,held_after,pnl");
        assert_eq!(lines[1], "BUY,2024-01,100.0,10,-35.0,10,");
        assert_eq!(lines[2], "SELL,2024-02,110.0,10,31.5,0,100.0");
    }

    #[test]
    fn empty_log_still_has_header() {
        assert_eq!(
            render(&[]),
            "side,time,price,quantity,deviation,held_after,pnl\n"
        );
    }
}

//! asterix-receiver: UDP front end for asterix-core.
//!
//! Binds a UDP socket, feeds every datagram to a `PacketDispatcher` with
//! CAT 001 and CAT 002 registered, and prints decoded reports as text or
//! JSON lines. Statistics go to stderr every `--stats-every` packets and
//! when the packet limit is reached.

use std::net::UdpSocket;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use clap::Parser;
use comfy_table::Table;

use asterix_core::{
    Asterix1Report, Asterix2Report, AsterixStatsSnapshot, Cat001Handler, Cat002Handler,
    PacketDispatcher, ReportListener, SourceStateStore,
};

#[derive(Parser)]
#[command(
    name = "asterix-receiver",
    version,
    about = "ASTERIX UDP receiver and decoder"
)]
struct Cli {
    /// UDP port to listen on
    #[arg(long, default_value = "4321")]
    port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Print decoded reports as JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Print a statistics table every N packets (0 = only at exit)
    #[arg(long, default_value = "1000")]
    stats_every: u64,

    /// Stop after N packets (0 = run forever)
    #[arg(long, default_value = "0")]
    limit: u64,
}

/// Prints CAT 001 plots as they decode.
struct PlotPrinter {
    json: bool,
}

impl ReportListener<Asterix1Report> for PlotPrinter {
    fn on_report(&self, report: &Asterix1Report) {
        if self.json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("JSON encode error: {e}"),
            }
        } else {
            println!(
                "[CAT001] {} tod={} range={:.0}m azimuth={:.4}rad",
                report.source_id, report.tod, report.range_m, report.azimuth_rad
            );
        }
    }
}

/// Prints CAT 002 service messages as they decode.
struct ServicePrinter {
    json: bool,
}

impl ReportListener<Asterix2Report> for ServicePrinter {
    fn on_report(&self, report: &Asterix2Report) {
        if self.json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("JSON encode error: {e}"),
            }
        } else {
            println!(
                "[CAT002] {} tod={} antenna={:.2}rpm",
                report.source_id, report.tod, report.antenna_speed_rpm
            );
        }
    }
}

fn print_stats(snap: &AsterixStatsSnapshot) {
    let mut table = Table::new();
    table.set_header(vec!["counter", "value"]);
    table.add_row(vec!["packets".to_string(), snap.total_packets.to_string()]);
    table.add_row(vec!["trailing bytes".to_string(), snap.trailing_bytes_count.to_string()]);
    table.add_row(vec![
        "unhandled categories".to_string(),
        snap.unhandled_categories.to_string(),
    ]);
    table.add_row(vec!["malformed blocks".to_string(), snap.malformed_blocks.to_string()]);
    table.add_row(vec!["malformed records".to_string(), snap.malformed_records.to_string()]);
    table.add_row(vec![
        "record parse errors".to_string(),
        snap.record_parse_errors.to_string(),
    ]);
    table.add_row(vec![
        "protocol violations".to_string(),
        snap.protocol_violations.to_string(),
    ]);
    table.add_row(vec!["unhandled items".to_string(), snap.unhandled_items.to_string()]);
    eprintln!("{table}");
}

fn main() {
    let cli = Cli::parse();

    let sources = Arc::new(SourceStateStore::new());

    // Listeners are weakly held by the handlers; the strong handles live
    // here for the whole run.
    let plot_printer = Arc::new(PlotPrinter { json: cli.json });
    let service_printer = Arc::new(ServicePrinter { json: cli.json });

    let cat1 = Cat001Handler::new(Arc::clone(&sources));
    cat1.add_listener(
        Arc::downgrade(&plot_printer) as Weak<dyn ReportListener<Asterix1Report>>
    );
    let cat2 = Cat002Handler::new(Arc::clone(&sources));
    cat2.add_listener(
        Arc::downgrade(&service_printer) as Weak<dyn ReportListener<Asterix2Report>>
    );

    let mut dispatcher = PacketDispatcher::new();
    dispatcher.register_category(1, Box::new(cat1));
    dispatcher.register_category(2, Box::new(cat2));

    let addr = format!("{}:{}", cli.bind, cli.port);
    let socket = match UdpSocket::bind(&addr) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot bind to {addr}: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("ASTERIX receiver active on udp://{addr} (CAT 001, CAT 002)");

    // Largest UDP payload we expect; ASTERIX datagrams are far smaller.
    let mut buf = [0u8; 65_536];
    let mut packets = 0u64;

    loop {
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) => {
                eprintln!("recv error: {e}");
                continue;
            }
        };

        dispatcher.handle_packet(&buf[..len], SystemTime::now());
        packets += 1;

        if cli.stats_every > 0 && packets % cli.stats_every == 0 {
            print_stats(&dispatcher.stats_snapshot());
        }
        if cli.limit > 0 && packets >= cli.limit {
            break;
        }
    }

    eprintln!("Done: {} sources seen", sources.len());
    print_stats(&dispatcher.stats_snapshot());
}

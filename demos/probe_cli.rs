// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Example: command-line latency probe against a timing server.
//!
//! Run with: `cargo run --example probe_cli -- -a 192.0.2.10 -p 9000 -n 200`
//!
//! Flags: `-a` address, `-p` port, `-n` packet count, `-t` tick interval
//! (ms), `-s` payload size (bytes), `-i` client id. Set `RUST_LOG=debug`
//! for a trace of the sync exchanges.

use std::net::SocketAddr;

use lagprobe::ProbeSession;

struct Args {
    addr: String,
    port: u16,
    count: u32,
    tick_ms: u32,
    payload: u32,
    client_id: u32,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        addr: "127.0.0.1".to_string(),
        port: 9000,
        count: 100,
        tick_ms: 20,
        payload: 0,
        client_id: 0,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag.as_str() {
            "-a" | "--addr" => args.addr = value,
            "-p" | "--port" => {
                args.port = value.parse().map_err(|_| format!("bad port: {value}"))?;
            }
            "-n" | "--count" => {
                args.count = value.parse().map_err(|_| format!("bad count: {value}"))?;
            }
            "-t" | "--tick" => {
                args.tick_ms = value.parse().map_err(|_| format!("bad tick: {value}"))?;
            }
            "-s" | "--payload" => {
                args.payload = value.parse().map_err(|_| format!("bad payload: {value}"))?;
            }
            "-i" | "--id" => {
                args.client_id = value.parse().map_err(|_| format!("bad id: {value}"))?;
            }
            other => return Err(format!("unknown flag: {other}")),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("usage: probe_cli [-a addr] [-p port] [-n count] [-t tick_ms] [-s payload] [-i id]");
            std::process::exit(2);
        }
    };

    let server: SocketAddr = format!("{}:{}", args.addr, args.port).parse()?;
    println!("Probing {server}: {} packets every {} ms...", args.count, args.tick_ms);

    let session = ProbeSession::builder()
        .server(server)
        .packet_count(args.count)
        .tick_interval_ms(args.tick_ms)
        .payload_size(args.payload)
        .client_id(args.client_id)
        .build()
        .await?;

    let (handle, mut progress) = session.start();

    let printer = tokio::spawn(async move {
        while let Some(update) = progress.recv().await {
            println!(
                "seq {:>5} | avg {:>7.2} ms | min {:>7.2} | max {:>7.2} | lost {} | ooo {}",
                update.sequence,
                update.stats.avg_ms(),
                update.stats.min_ms,
                update.stats.max_ms,
                update.stats.lost,
                update.stats.out_of_order,
            );
        }
    });

    let report = handle.join().await?;
    let _ = printer.await;
    println!(
        "\n{:?}: {} samples, avg {:.2} ms, min {:.2} ms, max {:.2} ms, lost {}, out of order {}",
        report.outcome,
        report.stats.sample_count,
        report.stats.avg_ms(),
        report.stats.min_ms,
        report.stats.max_ms,
        report.stats.lost,
        report.stats.out_of_order,
    );
    Ok(())
}

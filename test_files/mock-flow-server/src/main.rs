//! Mock flow data server.
//! Serves synthetic scenes, locations, graph edges and flow records in the
//! `{code, message, data}` envelope, with optional latency and failures.

use clap::Parser;
use serde::Serialize;
use shared::{ApiEnvelope, Edge, FlowRecord, Location, LocationFlows, Scene};
use std::{collections::HashMap, thread, time::Duration};
use tiny_http::{Header, Request, Response, Server};

#[derive(Parser)]
#[command(name = "mock-flow-server")]
#[command(about = "Mock flow data server for flowscope")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8090")]
    port: u16,

    /// Artificial delay per chunk request in milliseconds
    #[arg(short, long, default_value = "50")]
    latency_ms: u64,

    /// Answer every Nth chunk request with HTTP 500 (0 = never)
    #[arg(long, default_value = "0")]
    fail_every: u64,

    /// Locations per scene
    #[arg(long, default_value = "5")]
    locations: usize,
}

const AREA_ID: u64 = 1;

fn scenes() -> Vec<Scene> {
    vec![
        Scene {
            scene_id: 1,
            name: Some("Morning rush".to_string()),
            area_id: Some(AREA_ID),
            step_length: 60,
            measurement_start_time: 1_700_000_000,
            measurement_end_time: 1_700_000_000 + 120 * 60,
        },
        Scene {
            scene_id: 2,
            name: Some("Night".to_string()),
            area_id: None,
            step_length: 300,
            measurement_start_time: 1_700_050_000,
            measurement_end_time: 1_700_050_000 + 48 * 300,
        },
    ]
}

fn location_id(index: usize) -> String {
    format!("loc-{:03}", index)
}

fn main() {
    let args = Args::parse();

    let addr = format!("127.0.0.1:{}", args.port);
    let server = match Server::http(&addr) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to start server on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    println!("Mock flow server on http://{}/api", addr);
    println!("  GET /api/scenes");
    println!("  GET /api/scenes/{{id}}/locations");
    println!("  GET /api/graph?area_id=");
    println!("  GET /api/scenes/{{id}}/measurements?start_time=&step=");
    println!("  GET /api/scenes/{{id}}/predictions?start_time=&step=");
    println!();

    let mut chunk_requests = 0u64;
    for request in server.incoming_requests() {
        let url = request.url().to_string();
        println!("{} {}", request.method(), url);

        let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
        let query = parse_query(query);
        let segments: Vec<&str> = path
            .trim_start_matches("/api")
            .trim_matches('/')
            .split('/')
            .collect();

        match segments.as_slice() {
            ["scenes"] => respond_json(request, &ApiEnvelope::success(scenes())),
            ["scenes", id, "locations"] => match find_scene(id) {
                Some(_) => respond_json(request, &ApiEnvelope::success(locations(&args))),
                None => respond_json(request, &unknown_scene(id)),
            },
            ["graph"] => {
                let edges = if query.get("area_id").map(String::as_str) == Some("1") {
                    graph(&args)
                } else {
                    Vec::new()
                };
                respond_json(request, &ApiEnvelope::success(edges));
            }
            ["scenes", id, kind @ ("measurements" | "predictions")] => {
                chunk_requests += 1;
                thread::sleep(Duration::from_millis(args.latency_ms));

                if args.fail_every > 0 && chunk_requests % args.fail_every == 0 {
                    println!("  -> 500 (injected)");
                    let _ = request.respond(Response::empty(500));
                    continue;
                }

                let Some(scene) = find_scene(id) else {
                    respond_json(request, &unknown_scene(id));
                    continue;
                };
                let window = query
                    .get("start_time")
                    .and_then(|value| value.parse::<i64>().ok())
                    .zip(query.get("step").and_then(|value| value.parse::<usize>().ok()));
                let Some((start_time, step_count)) = window else {
                    respond_json(
                        request,
                        &ApiEnvelope::<()>::failure(400, "start_time and step are required"),
                    );
                    continue;
                };

                let data = flows(&scene, &args, *kind == "predictions", start_time, step_count);
                respond_json(request, &ApiEnvelope::success(data));
            }
            _ => {
                let _ = request.respond(Response::empty(404));
                println!("  -> 404 Not Found");
            }
        }
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn find_scene(id: &str) -> Option<Scene> {
    let scene_id = id.parse::<u64>().ok()?;
    scenes().into_iter().find(|scene| scene.scene_id == scene_id)
}

fn unknown_scene(id: &str) -> ApiEnvelope<()> {
    ApiEnvelope::failure(404, format!("unknown scene {}", id))
}

fn locations(args: &Args) -> Vec<Location> {
    (0..args.locations)
        .map(|index| Location {
            location_id: location_id(index),
            longitude: 13.40 + index as f64 * 0.005,
            latitude: 52.52 - index as f64 * 0.003,
        })
        .collect()
}

fn graph(args: &Args) -> Vec<Edge> {
    (1..args.locations)
        .map(|index| Edge {
            source: location_id(index - 1),
            target: location_id(index),
        })
        .collect()
}

/// Predictions only exist for the first half of a scene.
fn flows(
    scene: &Scene,
    args: &Args,
    prediction: bool,
    start_time: i64,
    step_count: usize,
) -> Vec<LocationFlows> {
    let midpoint = scene.measurement_start_time
        + (scene.measurement_end_time - scene.measurement_start_time) / 2;
    if prediction && start_time >= midpoint {
        return Vec::new();
    }

    (0..args.locations)
        .map(|index| LocationFlows {
            location_id: location_id(index),
            flows: (0..step_count)
                .map(|k| start_time + k as i64 * scene.step_length)
                .take_while(|&time| time < scene.measurement_end_time)
                .map(|time| FlowRecord {
                    record_id: (time as u64) * 100 + index as u64,
                    time,
                    velocity: velocity(time, index, prediction),
                })
                .collect(),
        })
        .collect()
}

fn velocity(time: i64, location: usize, prediction: bool) -> f64 {
    let phase = time as f64 / 900.0 + location as f64;
    let base = 55.0 + 20.0 * phase.sin();
    if prediction { base * 0.95 } else { base }
}

fn respond_json<T: Serialize>(request: Request, body: &T) {
    let body = match serde_json::to_string(body) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("  -> Failed to encode response: {}", e);
            let _ = request.respond(Response::empty(500));
            return;
        }
    };
    let response = Response::from_string(body);
    let response = match Header::from_bytes("Content-Type", "application/json") {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    };
    let _ = request.respond(response);
}

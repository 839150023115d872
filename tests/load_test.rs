//! Load testing for the load balancer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

mod common;

#[tokio::test]
async fn test_load_distribution() {
    // 1. Setup Mock Backends
    let b1 = common::start_mock_backend("b1").await;
    let b2 = common::start_mock_backend("b2").await;

    // 2. Start Proxy
    let proxy = common::start_proxy(common::config_for(&[b1, b2], 5_000)).await;

    // 3. Run Load Test
    let concurrency = 20; // Reduced for consistency in debug mode
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = proxy.url("/");
        tasks.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        if let Ok(body) = res.text().await {
                            results.push((body, req_start.elapsed()));
                        }
                    }
                }
            }
            results
        }));
    }

    let mut hits: HashMap<String, usize> = HashMap::new();
    let mut latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        for (body, latency) in task.await.unwrap() {
            *hits.entry(body).or_default() += 1;
            latencies.push(latency);
        }
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    if latencies.is_empty() {
        panic!("No successful requests recorded");
    }

    latencies.sort();
    let p50 = latencies[latencies.len() / 2];
    let p99 = latencies[((latencies.len() as f64 * 0.99) as usize).min(latencies.len() - 1)];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("Hits:           {:?}", hits);
    println!("Success Rate:   {}/{}", latencies.len(), total_requests);
    println!("-------------------------\n");

    assert!(latencies.len() * 100 >= total_requests * 95, "success rate below 95%");
    assert!(hits.get("b1").copied().unwrap_or(0) > 0);
    assert!(hits.get("b2").copied().unwrap_or(0) > 0);

    proxy.shutdown.trigger();
}

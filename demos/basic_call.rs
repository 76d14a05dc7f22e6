//! Basic example demonstrating a shared client and per-call builders.
//!
//! This example shows how to:
//! - Create a client with default headers and validation
//! - Make GET requests and decode JSON
//! - Make POST requests with a JSON body
//! - Derive a client without touching the original
//! - Branch on the phase of an error
//! - Download a file to disk
//!
//! Run with: `cargo run --example basic_call`

use callwright::{Client, Error, Modifiable, Phase};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("callwright=debug,basic_call=info")
        .init();

    // Create a client for the JSONPlaceholder API
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("User-Agent", "callwright-demo/0.1")
        .timeout(Duration::from_secs(10))
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.get("/posts/1").perform_json::<Post>().await?;

    println!("Post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let created: Post = client.post("/posts").json(&new_post).json_body().await?;
    println!("Created post with ID: {}", created.id);
    println!();

    println!("=== Derived Client Example ===");
    let filtered = client.query_item("userId", Some("1"));
    let posts: Vec<Post> = filtered.get("/posts").json_body().await?;
    println!("User 1 has {} posts", posts.len());
    println!();

    println!("=== Error Phase Example ===");
    match client.get("/posts/does-not-exist").send().await {
        Ok(()) => println!("Unexpectedly found it"),
        Err(err) if err.phase() == Phase::Validate => {
            println!("Rejected with status {:?}", err.status());
        }
        Err(err) => println!("Failed in {:?}: {}", err.phase(), err),
    }
    println!();

    println!("=== Download Example ===");
    let destination = std::env::temp_dir().join(format!("callwright-post-{}.json", std::process::id()));
    let saved = client.get("/posts/2").download(&destination).await?;
    println!("Saved {} to {}", saved.url, saved.data.display());
    // Best-effort cleanup of the demo file.
    let _ = std::fs::remove_file(&saved.data);

    Ok(())
}

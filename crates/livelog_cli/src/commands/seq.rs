//! Seq command implementation.

use livelog_server::{LogServer, ServerConfig};
use serde_json::json;

/// Publishes `count` updates, then walks and prints the diff pages.
pub fn run(count: u64, page_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let server = LogServer::new(ServerConfig::new().with_page_size(page_size));

    for n in 1..=count {
        server.publish_silent(json!({
            "type": "feed-posted",
            "source": "demo",
            "by": "generator",
            "date": 1_700_000_000_000u64 + n,
            "repeatKey": null,
            "seq": n,
            "content": { "kind": "text", "text": format!("demo post {n}") }
        }));
    }

    println!("current seq: {}", server.current_seq());

    let mut cursor = 0;
    let mut pages = 0;
    loop {
        let page = server.diff_since(cursor)?;
        pages += 1;
        println!(
            "page {pages}: {} updates, cursor {} -> {}, has_more: {}",
            page.updates.len(),
            cursor,
            page.next_seq,
            page.has_more
        );
        cursor = page.next_seq;
        if !page.has_more {
            break;
        }
    }

    Ok(())
}

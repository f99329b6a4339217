//! A minimal CLI client for exercising the server against a live
//! connection: register or log in, join a cash table, then stream
//! `table_update`/`error` pushes to stdout while reading actions from
//! stdin (`check`, `call`, `raise <amount>`, `fold`, `sitout`, `sitin`).

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() {
    let url = std::env::args().nth(1).unwrap_or_else(|| "ws://127.0.0.1:8080/ws".to_string());
    let email = std::env::args().nth(2).unwrap_or_else(|| "player@example.com".to_string());
    let username = std::env::args().nth(3).unwrap_or_else(|| "player".to_string());
    let table_id = std::env::args().nth(4).unwrap_or_else(|| "cash-micro".to_string());

    let (ws, _resp) = connect_async(url.as_str()).await.expect("connect");
    let (mut write, mut read) = ws.split();

    let register = serde_json::json!({
        "type": "register",
        "email": email,
        "username": username,
        "password": "hunter222",
        "security_question_index": 0,
        "security_answer": "rex",
    });
    write.send(Message::Text(register.to_string())).await.unwrap();

    let login = serde_json::json!({ "type": "login", "email": email, "password": "hunter222" });
    write.send(Message::Text(login.to_string())).await.unwrap();

    let join = serde_json::json!({ "type": "join_cash_table", "table_id": table_id, "buy_in": 200 });
    write.send(Message::Text(join.to_string())).await.unwrap();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => println!("<- {text}"),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => { eprintln!("connection error: {e}"); break; }
                    _ => {}
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                let mut parts = line.split_whitespace();
                let action = match parts.next() {
                    Some("check") => serde_json::json!({ "type": "check" }),
                    Some("call") => serde_json::json!({ "type": "call" }),
                    Some("fold") => serde_json::json!({ "type": "fold" }),
                    Some("sitout") => serde_json::json!({ "type": "sitout" }),
                    Some("sitin") => serde_json::json!({ "type": "sitin" }),
                    Some("raise") => {
                        let amount: u64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                        serde_json::json!({ "type": "raise", "amount": amount })
                    }
                    _ => continue,
                };
                if write.send(Message::Text(action.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }
}

//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! WebSocket message adapter

use crate::transport::{Received, TransportError, TransportKind, TransportReader, TransportWriter};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};

/// Split an upgraded socket into transport halves
pub fn split(
    socket: WebSocket,
) -> (
    WebSocketReader<SplitStream<WebSocket>>,
    WebSocketWriter<SplitSink<WebSocket, Message>>,
) {
    let (sink, stream) = socket.split();
    (WebSocketReader::new(stream), WebSocketWriter::new(sink))
}

pub struct WebSocketReader<S> {
    stream: S,
}

impl<S> WebSocketReader<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> TransportReader for WebSocketReader<S>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn read(&mut self) -> Result<Received, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Received::Message(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => return Ok(Received::Message(data.to_vec())),
                // Pings are answered by the socket itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::WebSocket(e.to_string())),
            }
        }
    }
}

pub struct WebSocketWriter<W> {
    sink: W,
}

impl<W> WebSocketWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<W> TransportWriter for WebSocketWriter<W>
where
    W: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(data).into_owned();
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_messages_map_to_lines() {
        let messages: Vec<Result<Message, axum::Error>> = vec![
            Ok(Message::Text("look".into())),
            Ok(Message::Ping(Vec::new().into())),
            Ok(Message::Binary(b"say hi".to_vec().into())),
            Ok(Message::Close(None)),
        ];
        let mut reader = WebSocketReader::new(stream::iter(messages));

        assert_eq!(
            reader.read().await.unwrap(),
            Received::Message(b"look".to_vec())
        );
        assert_eq!(
            reader.read().await.unwrap(),
            Received::Message(b"say hi".to_vec())
        );
        assert!(reader.read().await.unwrap_err().is_closed());
        assert_eq!(reader.kind(), TransportKind::WebSocket);
    }

    #[tokio::test]
    async fn test_end_of_stream_is_closed() {
        let messages: Vec<Result<Message, axum::Error>> = Vec::new();
        let mut reader = WebSocketReader::new(stream::iter(messages));
        assert!(reader.read().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_writer_sends_text_frames() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Message>();
        let sink = tx.sink_map_err(axum::Error::new);
        let mut writer = WebSocketWriter::new(sink);

        writer.write(b"Welcome").await.unwrap();
        writer.close().await.unwrap();
        drop(writer);

        let sent: Vec<Message> = rx.collect().await;
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Message::Text(text) if text.as_str() == "Welcome"));
        assert!(matches!(sent[1], Message::Close(None)));
    }
}

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

//! Telnet byte-stream adapter

use crate::transport::{
    READ_BUFFER_SIZE, Received, TransportError, TransportKind, TransportReader, TransportWriter,
};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Split any byte stream into telnet transport halves
pub fn split<S>(stream: S) -> (TelnetReader<ReadHalf<S>>, TelnetWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    (TelnetReader::new(reader), TelnetWriter::new(writer))
}

pub struct TelnetReader<R> {
    inner: R,
    buffer: Box<[u8; READ_BUFFER_SIZE]>,
}

impl<R> TelnetReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Box::new([0u8; READ_BUFFER_SIZE]),
        }
    }
}

#[async_trait]
impl<R> TransportReader for TelnetReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    fn kind(&self) -> TransportKind {
        TransportKind::Telnet
    }

    async fn read(&mut self) -> Result<Received, TransportError> {
        let n = self.inner.read(&mut self.buffer[..]).await?;
        if n == 0 {
            return Err(TransportError::Closed);
        }
        Ok(Received::Bytes(self.buffer[..n].to_vec()))
    }
}

pub struct TelnetWriter<W> {
    inner: W,
}

impl<W> TelnetWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> TransportWriter for TelnetWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes a response into its exact wire form.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    buf.extend_from_slice(&resp.header_bytes());
    if !resp.headers.is_empty() {
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf.extend_from_slice(&resp.body);

    buf
}

/// A serialized response plus how much of it has reached the peer.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_headers_and_body() {
        let bytes = serialize_response(&Response::not_found());
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(
            text,
            "HTTP/1.1 404 Not Found\r\n\
             Accept-Ranges: bytes\r\n\
             Content-Type: text/html\r\n\
             Content-Length: 13\r\n\
             Cache-Control: max-age=86000\r\n\
             Connection: close\r\n\
             \r\n\
             404 Not Found"
        );
    }

    #[tokio::test]
    async fn writes_everything_through_a_small_pipe() {
        use tokio::io::AsyncReadExt;

        let response = Response::not_found();
        let expected = serialize_response(&response);
        let (mut client, mut server) = tokio::io::duplex(8);

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            received
        });

        ResponseWriter::new(&response)
            .write_to_stream(&mut server)
            .await
            .unwrap();
        drop(server);

        assert_eq!(reader.await.unwrap(), expected);
    }
}

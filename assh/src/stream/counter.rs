use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{AsyncBufRead, AsyncRead, AsyncWrite};

/// Wraps a [`Pipe`](super::Pipe) to count the number of bytes that flowed
/// through it since the last [`IoCounter::reset`], used to trigger rekeys
/// after the RFC-recommended threshold of data (see [`super::REKEY_BYTES_THRESHOLD`]).
pub struct IoCounter<S> {
    inner: S,
    count: usize,
}

impl<S> IoCounter<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for IoCounter<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(n)) = &poll {
            self.count += n;
        }

        poll
    }
}

impl<S: AsyncBufRead + Unpin> AsyncBufRead for IoCounter<S> {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<&[u8]>> {
        let this = self.get_mut();

        Pin::new(&mut this.inner).poll_fill_buf(cx)
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        self.count += amt;

        Pin::new(&mut self.inner).consume(amt)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IoCounter<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);

        if let Poll::Ready(Ok(n)) = &poll {
            self.count += n;
        }

        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_close(cx)
    }
}

//! Lazy, single-pass view over the entities produced by one request.
//!
//! A [`Resultset`] owns a [`ResultSource`] describing exactly one lookup.
//! Nothing is fetched until the first call to [`Resultset::first`] or
//! [`Resultset::next`]; pages are then pulled on demand and every entry is
//! hydrated right before it is handed out.

use futures::stream::{self, Stream};
use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Backing request of a resultset
#[async_trait::async_trait]
pub trait ResultSource: Send {
    /// Entry as delivered by one page
    type Raw: Clone + Send;
    /// Hydrated entity yielded to callers
    type Item: Send;

    /// Fetch the next page; `None` once the request is exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Self::Raw>>>;

    /// Turn one raw entry into a fully hydrated entity
    async fn hydrate(&mut self, raw: Self::Raw) -> Result<Self::Item>;
}

pub struct Resultset<S: ResultSource> {
    source: S,
    buffer: VecDeque<S::Raw>,
    peeked: Option<S::Item>,
    exhausted: bool,
    to_skip: usize,
    remaining: Option<usize>,
}

impl<S: ResultSource> Resultset<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            peeked: None,
            exhausted: false,
            to_skip: 0,
            remaining: None,
        }
    }

    /// Drop the next `n` entities that have not been yielded yet
    pub fn skip(mut self, mut n: usize) -> Self {
        if n > 0 && self.peeked.take().is_some() {
            n -= 1;
        }
        self.to_skip += n;
        self
    }

    /// Yield at most `n` more entities
    pub fn take(mut self, n: usize) -> Self {
        self.remaining = Some(self.remaining.map_or(n, |r| r.min(n)));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Make sure a raw entry is buffered, pulling pages as needed
    async fn fill(&mut self) -> Result<bool> {
        loop {
            while self.to_skip > 0 && self.buffer.pop_front().is_some() {
                self.to_skip -= 1;
            }

            if self.to_skip == 0 && !self.buffer.is_empty() {
                return Ok(true);
            }

            if self.exhausted {
                return Ok(false);
            }

            match self.source.next_batch().await? {
                Some(batch) => self.buffer.extend(batch),
                None => self.exhausted = true,
            }
        }
    }

    async fn pull(&mut self) -> Result<Option<S::Item>> {
        if let Some(item) = self.peeked.take() {
            return Ok(Some(item));
        }

        if !self.fill().await? {
            return Ok(None);
        }

        let Some(raw) = self.buffer.pop_front() else {
            return Ok(None);
        };

        // a failed hydration leaves the entry in place for the next call
        match self.source.hydrate(raw.clone()).await {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                self.buffer.push_front(raw);
                Err(e)
            }
        }
    }

    /// Next hydrated entity, `None` when the sequence is finished
    pub async fn next(&mut self) -> Result<Option<S::Item>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        let item = self.pull().await?;
        if item.is_some() {
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
        }
        Ok(item)
    }

    /// First entity without consuming it; later iteration still yields it
    pub async fn first(&mut self) -> Result<S::Item>
    where
        S::Item: Clone,
    {
        if self.remaining == Some(0) {
            return Err(Error::EmptyResult);
        }

        if self.peeked.is_none() {
            self.peeked = self.pull().await?;
        }

        self.peeked.clone().ok_or(Error::EmptyResult)
    }

    /// Drain the remaining entities
    pub async fn collect(mut self) -> Result<Vec<S::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Count the remaining entities without hydrating them
    pub async fn count(mut self) -> Result<usize> {
        let mut count = 0;
        if self.peeked.take().is_some() {
            count += 1;
        }

        loop {
            if self.remaining.is_some_and(|r| count >= r) {
                return Ok(count);
            }
            if !self.fill().await? {
                return Ok(count);
            }
            self.buffer.pop_front();
            count += 1;
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<S::Item>> {
        stream::try_unfold(self, |mut rs| async move {
            Ok::<_, Error>(rs.next().await?.map(|item| (item, rs)))
        })
    }
}

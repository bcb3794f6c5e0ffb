//! Turning visible page nodes into records
//!
//! Extractors read whatever is currently rendered. They return redundant
//! candidates freely (the caller deduplicates) and tolerate nodes that
//! vanish between the query and the read.

use crate::config::{ImagesConfig, MetricsConfig, TranscriptConfig};
use crate::driver::{DriverError, DriverResult, PageDriver};
use crate::record::{ImageAsset, MessagePair, MetricsRow, Record, RecordKind, MISSING_FIELD};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Image links written as plain text inside messages
static IMAGE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://\S+\.(?:jpg|jpeg|png|gif)").expect("image link pattern is valid")
});

/// Candidates read from one pass over the page
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<Record>,

    /// Candidates skipped because their node went stale mid-read
    pub stale: usize,
}

impl Extraction {
    fn push(&mut self, record: impl Into<Record>) {
        self.records.push(record.into());
    }

    /// Absorbs a per-candidate failure, propagating anything that is not transient
    fn skip(&mut self, err: DriverError) -> DriverResult<()> {
        if err.is_transient() {
            tracing::debug!("Skipping candidate: {}", err);
            self.stale += 1;
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Parses the currently visible nodes into typed records
#[async_trait]
pub trait ContentExtractor<D: PageDriver>: Send {
    fn kind(&self) -> RecordKind;

    async fn extract_visible(&mut self, driver: &D) -> DriverResult<Extraction>;

    /// Display name of the other party, once known
    fn counterpart(&self) -> Option<&str> {
        None
    }

    /// Column names for tabular records
    fn column_headers(&self) -> &[String] {
        &[]
    }
}

/// Reads the first match of `selector` inside `node`, trimmed
async fn text_within<D: PageDriver + ?Sized>(
    driver: &D,
    node: &D::Node,
    selector: &str,
) -> DriverResult<Option<String>> {
    match driver.query_within(node, selector).await?.first() {
        Some(inner) => Ok(Some(driver.read_text(inner).await?.trim().to_string())),
        None => Ok(None),
    }
}

/// Extracts human/bot message pairs from a chat transcript
pub struct MessagePairExtractor {
    pair: String,
    human: String,
    bot: String,
    bot_name_selector: String,
    bot_name: Option<String>,
}

impl MessagePairExtractor {
    pub fn new(config: &TranscriptConfig) -> Self {
        Self {
            pair: config.message_pair.clone(),
            human: config.human_bubble.clone(),
            bot: config.bot_bubble.clone(),
            bot_name_selector: config.bot_name.clone(),
            bot_name: None,
        }
    }

    async fn read_bot_name<D: PageDriver>(&self, driver: &D) -> Option<String> {
        let nodes = driver.query_nodes(&self.bot_name_selector).await.ok()?;
        let node = nodes.first()?;
        let name = driver.read_text(node).await.ok()?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    async fn read_pair<D: PageDriver>(
        &self,
        driver: &D,
        node: &D::Node,
    ) -> DriverResult<Option<MessagePair>> {
        let human = text_within(driver, node, &self.human).await?;
        let bot = text_within(driver, node, &self.bot).await?;

        let human = human.unwrap_or_else(|| MISSING_FIELD.to_string());
        let bot = bot.unwrap_or_else(|| MISSING_FIELD.to_string());
        if human == MISSING_FIELD && bot == MISSING_FIELD {
            return Ok(None);
        }
        Ok(Some(MessagePair::new(human, bot)))
    }
}

#[async_trait]
impl<D: PageDriver> ContentExtractor<D> for MessagePairExtractor {
    fn kind(&self) -> RecordKind {
        RecordKind::MessagePair
    }

    async fn extract_visible(&mut self, driver: &D) -> DriverResult<Extraction> {
        if self.bot_name.is_none() {
            self.bot_name = self.read_bot_name(driver).await;
            if let Some(name) = &self.bot_name {
                tracing::info!("Bot name: {}", name);
            }
        }

        let mut extraction = Extraction::default();
        for node in driver.query_nodes(&self.pair).await? {
            match self.read_pair(driver, &node).await {
                Ok(Some(pair)) => {
                    if pair.is_partial() {
                        tracing::debug!("Message pair with a missing side");
                    }
                    extraction.push(pair);
                }
                Ok(None) => tracing::debug!("Skipping message pair with no text"),
                Err(e) => extraction.skip(e)?,
            }
        }
        Ok(extraction)
    }

    fn counterpart(&self) -> Option<&str> {
        self.bot_name.as_deref()
    }
}

/// Extracts image URLs from `<img>` tags and from links in message text
pub struct ImageUrlExtractor {
    image: String,
    text_container: String,
}

impl ImageUrlExtractor {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            image: config.image.clone(),
            text_container: config.text_container.clone(),
        }
    }
}

#[async_trait]
impl<D: PageDriver> ContentExtractor<D> for ImageUrlExtractor {
    fn kind(&self) -> RecordKind {
        RecordKind::ImageAsset
    }

    async fn extract_visible(&mut self, driver: &D) -> DriverResult<Extraction> {
        let mut extraction = Extraction::default();

        for node in driver.query_nodes(&self.image).await? {
            match driver.read_attribute(&node, "src").await {
                Ok(Some(src)) if src.starts_with("http") => extraction.push(ImageAsset::new(src)),
                Ok(_) => {}
                Err(e) => extraction.skip(e)?,
            }
        }

        for node in driver.query_nodes(&self.text_container).await? {
            match driver.read_text(&node).await {
                Ok(text) => {
                    for link in IMAGE_LINK.find_iter(&text) {
                        extraction.push(ImageAsset::new(link.as_str()));
                    }
                }
                Err(e) => extraction.skip(e)?,
            }
        }

        Ok(extraction)
    }
}

/// Extracts rows from a metrics table, one page at a time
pub struct MetricsRowExtractor {
    table: String,
    header_cell: String,
    row: String,
    cell: String,
    cell_value: Option<String>,
    expected_cells: usize,
    headers: Vec<String>,
}

impl MetricsRowExtractor {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            table: config.table.clone(),
            header_cell: config.header_cell.clone(),
            row: config.row.clone(),
            cell: config.cell.clone(),
            cell_value: config.cell_value.clone(),
            expected_cells: config.expected_cells,
            headers: Vec::new(),
        }
    }

    async fn read_headers<D: PageDriver>(&self, driver: &D, table: &D::Node) -> DriverResult<Vec<String>> {
        let mut headers = Vec::new();
        for cell in driver.query_within(table, &self.header_cell).await? {
            headers.push(driver.read_text(&cell).await?.trim().to_string());
        }
        Ok(headers)
    }

    async fn read_cell<D: PageDriver>(&self, driver: &D, cell: &D::Node) -> DriverResult<String> {
        if let Some(selector) = &self.cell_value {
            if let Some(value) = text_within(driver, cell, selector).await? {
                return Ok(value);
            }
        }
        Ok(driver.read_text(cell).await?.trim().to_string())
    }

    async fn read_row<D: PageDriver>(&self, driver: &D, row: &D::Node) -> DriverResult<Option<MetricsRow>> {
        let cells = driver.query_within(row, &self.cell).await?;
        if cells.is_empty() {
            return Ok(None);
        }

        let mut values = Vec::with_capacity(cells.len().max(self.expected_cells));
        for cell in &cells {
            values.push(self.read_cell(driver, cell).await?);
        }
        if values.len() < self.expected_cells {
            tracing::debug!(
                "Row has {} of {} cells, padding",
                values.len(),
                self.expected_cells
            );
            values.resize(self.expected_cells, MISSING_FIELD.to_string());
        }
        Ok(Some(MetricsRow::new(values)))
    }
}

#[async_trait]
impl<D: PageDriver> ContentExtractor<D> for MetricsRowExtractor {
    fn kind(&self) -> RecordKind {
        RecordKind::MetricsRow
    }

    async fn extract_visible(&mut self, driver: &D) -> DriverResult<Extraction> {
        let mut extraction = Extraction::default();
        let tables = driver.query_nodes(&self.table).await?;
        let Some(table) = tables.first() else {
            return Ok(extraction);
        };

        if self.headers.is_empty() {
            match self.read_headers(driver, table).await {
                Ok(headers) => self.headers = headers,
                Err(e) => extraction.skip(e)?,
            }
        }

        for row in driver.query_within(table, &self.row).await? {
            match self.read_row(driver, &row).await {
                Ok(Some(row)) => extraction.push(row),
                Ok(None) => {}
                Err(e) => extraction.skip(e)?,
            }
        }
        Ok(extraction)
    }

    fn column_headers(&self) -> &[String] {
        &self.headers
    }
}

//! Live command transcripts.
//!
//! A command's output arrives as an indefinite sequence of byte chunks. The
//! chunks are decoded with a decoder that carries incomplete UTF-8 sequences
//! over to the next chunk, and appended to an ephemeral [`TranscriptBlock`]
//! shown above the node's persisted commands until the view is repopulated.

use std::collections::HashMap;

use futures::future::AbortHandle;
use futures::{Stream, StreamExt};

use crate::error::ApiError;
use crate::model::CommandRecord;

/// Incremental UTF-8 decoder. Bytes of a character split across chunk
/// boundaries are held back until the rest arrives; invalid sequences decode
/// to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
	pending: Vec<u8>,
}

impl Utf8StreamDecoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Decode `chunk`, returning every complete character available so far.
	pub fn decode(&mut self, chunk: &[u8]) -> String {
		self.pending.extend_from_slice(chunk);
		let mut out = String::with_capacity(self.pending.len());
		let mut rest: &[u8] = &self.pending;
		loop {
			match std::str::from_utf8(rest) {
				Ok(valid) => {
					out.push_str(valid);
					rest = &[];
					break;
				}
				Err(err) => {
					let (valid, after) = rest.split_at(err.valid_up_to());
					// valid_up_to guarantees this prefix is UTF-8
					out.push_str(&String::from_utf8_lossy(valid));
					match err.error_len() {
						Some(bad) => {
							out.push(char::REPLACEMENT_CHARACTER);
							rest = &after[bad..];
						}
						None => {
							rest = after;
							break;
						}
					}
				}
			}
		}
		self.pending = rest.to_vec();
		out
	}

	/// Flush at end of stream. A trailing incomplete sequence becomes U+FFFD.
	pub fn finish(&mut self) -> String {
		let tail = std::mem::take(&mut self.pending);
		String::from_utf8_lossy(&tail).into_owned()
	}
}

/// Read `chunks` to the end, handing decoded text to `sink` as it arrives.
/// Returns the number of bytes read.
pub async fn pump<S>(mut chunks: S, mut sink: impl FnMut(&str)) -> Result<usize, ApiError>
where
	S: Stream<Item = Result<Vec<u8>, ApiError>> + Unpin,
{
	let mut decoder = Utf8StreamDecoder::new();
	let mut total = 0;
	while let Some(chunk) = chunks.next().await {
		let bytes = chunk?;
		total += bytes.len();
		let text = decoder.decode(&bytes);
		if !text.is_empty() {
			sink(&text);
		}
	}
	let tail = decoder.finish();
	if !tail.is_empty() {
		sink(&tail);
	}
	Ok(total)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockStatus {
	Running,
	Finished,
	Failed(String),
}

/// Ephemeral view of one command while it executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptBlock {
	pub id: u64,
	pub command: String,
	pub output: String,
	pub status: BlockStatus,
	/// Bumped on every append; the view scrolls the block to its bottom when
	/// this changes.
	pub appends: u64,
}

impl TranscriptBlock {
	pub fn is_running(&self) -> bool {
		self.status == BlockStatus::Running
	}
}

/// One row of the node's command list, in display order.
#[derive(Clone, Debug, PartialEq)]
pub enum LogEntry {
	Live(TranscriptBlock),
	/// `index` is the position in the oldest-first persisted order.
	Persisted { index: usize, record: CommandRecord },
}

/// Command list of the open node: live blocks above persisted records.
#[derive(Debug, Default)]
pub struct CommandLog {
	node: Option<String>,
	/// Newest first.
	live: Vec<TranscriptBlock>,
	/// Oldest first, as stored.
	persisted: Vec<CommandRecord>,
	next_block: u64,
}

impl CommandLog {
	pub fn node(&self) -> Option<&str> {
		self.node.as_deref()
	}

	/// Show `records` for `node`, dropping any live blocks. Returns the ids
	/// of blocks that were still running.
	pub fn open(&mut self, node: &str, records: Vec<CommandRecord>) -> Vec<u64> {
		self.node = Some(node.to_string());
		self.persisted = records;
		self.drain_live()
	}

	/// Replace the persisted records. Finished and failed blocks give way to
	/// the records; running blocks stay on top.
	pub fn repopulate(&mut self, records: Vec<CommandRecord>) {
		self.persisted = records;
		self.live.retain(TranscriptBlock::is_running);
	}

	/// Forget the node. Returns the ids of blocks that were still running.
	pub fn close(&mut self) -> Vec<u64> {
		self.node = None;
		self.persisted.clear();
		self.drain_live()
	}

	fn drain_live(&mut self) -> Vec<u64> {
		std::mem::take(&mut self.live)
			.into_iter()
			.filter(TranscriptBlock::is_running)
			.map(|block| block.id)
			.collect()
	}

	/// Insert a running block at the top.
	pub fn start_block(&mut self, command: &str) -> u64 {
		self.next_block += 1;
		let id = self.next_block;
		self.live.insert(
			0,
			TranscriptBlock {
				id,
				command: command.to_string(),
				output: String::new(),
				status: BlockStatus::Running,
				appends: 0,
			},
		);
		id
	}

	/// Append text to a block. `false` once the block has been discarded.
	pub fn append(&mut self, id: u64, text: &str) -> bool {
		match self.block_mut(id) {
			Some(block) => {
				block.output.push_str(text);
				block.appends += 1;
				true
			}
			None => false,
		}
	}

	pub fn finish(&mut self, id: u64) {
		if let Some(block) = self.block_mut(id) {
			block.status = BlockStatus::Finished;
		}
	}

	/// Append a bracketed error marker and mark the block failed.
	pub fn fail(&mut self, id: u64, message: &str) {
		if let Some(block) = self.block_mut(id) {
			block.output.push_str(&format!("\n[ERROR] {message}\n"));
			block.appends += 1;
			block.status = BlockStatus::Failed(message.to_string());
		}
	}

	pub fn discard(&mut self, id: u64) {
		self.live.retain(|block| block.id != id);
	}

	pub fn block(&self, id: u64) -> Option<&TranscriptBlock> {
		self.live.iter().find(|block| block.id == id)
	}

	pub fn persisted(&self) -> &[CommandRecord] {
		&self.persisted
	}

	/// Live blocks newest first, then persisted records newest first.
	pub fn entries(&self) -> Vec<LogEntry> {
		let live = self.live.iter().cloned().map(LogEntry::Live);
		let persisted = self
			.persisted
			.iter()
			.enumerate()
			.rev()
			.map(|(index, record)| LogEntry::Persisted {
				index,
				record: record.clone(),
			});
		live.chain(persisted).collect()
	}

	fn block_mut(&mut self, id: u64) -> Option<&mut TranscriptBlock> {
		self.live.iter_mut().find(|block| block.id == id)
	}
}

/// Abort handles of in-flight stream reads, keyed by transcript block.
#[derive(Default)]
pub struct StreamRegistry {
	running: HashMap<u64, (String, AbortHandle)>,
}

impl StreamRegistry {
	pub fn register(&mut self, block: u64, node: &str, handle: AbortHandle) {
		self.running.insert(block, (node.to_string(), handle));
	}

	pub fn unregister(&mut self, block: u64) {
		self.running.remove(&block);
	}

	pub fn cancel(&mut self, block: u64) -> bool {
		match self.running.remove(&block) {
			Some((_, handle)) => {
				handle.abort();
				true
			}
			None => false,
		}
	}

	/// Abort every read owned by `node`, returning the affected blocks.
	pub fn cancel_node(&mut self, node: &str) -> Vec<u64> {
		let blocks: Vec<u64> = self
			.running
			.iter()
			.filter(|(_, (owner, _))| owner == node)
			.map(|(block, _)| *block)
			.collect();
		for block in &blocks {
			self.cancel(*block);
		}
		blocks
	}

	pub fn len(&self) -> usize {
		self.running.len()
	}

	pub fn is_empty(&self) -> bool {
		self.running.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::executor::block_on;
	use futures::future::{AbortHandle, Abortable};
	use futures::stream;
	use pretty_assertions::assert_eq;

	fn record(command: &str) -> CommandRecord {
		CommandRecord {
			command: command.into(),
			output: format!("{command} output"),
			timestamp: chrono::NaiveDateTime::default(),
		}
	}

	#[test]
	fn decoder_joins_characters_split_across_chunks() {
		let text = "é€🦀";
		let bytes = text.as_bytes();
		let mut decoder = Utf8StreamDecoder::new();
		let mut out = String::new();
		// split inside each multi-byte sequence
		for chunk in [&bytes[..1], &bytes[1..3], &bytes[3..6], &bytes[6..8], &bytes[8..]] {
			out.push_str(&decoder.decode(chunk));
		}
		out.push_str(&decoder.finish());
		assert_eq!(out, text);
	}

	#[test]
	fn decoder_holds_back_only_the_incomplete_tail() {
		let mut decoder = Utf8StreamDecoder::new();
		assert_eq!(decoder.decode(b"ab\xE2\x82"), "ab");
		assert_eq!(decoder.decode(b"\xACc"), "€c");
	}

	#[test]
	fn decoder_replaces_invalid_bytes() {
		let mut decoder = Utf8StreamDecoder::new();
		assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
		assert_eq!(decoder.decode(b"\xF0\x9F"), "");
		assert_eq!(decoder.finish(), "\u{FFFD}");
	}

	#[test]
	fn pump_feeds_sink_per_chunk() {
		let chunks = stream::iter(vec![
			Ok(b"ro".to_vec()),
			Ok(b"ot\n".to_vec()),
		]);
		let mut seen = Vec::new();
		let total = block_on(pump(chunks, |text| seen.push(text.to_string()))).unwrap();
		assert_eq!(total, 5);
		assert_eq!(seen, vec!["ro", "ot\n"]);
	}

	#[test]
	fn pump_stops_on_transport_error() {
		let chunks = stream::iter(vec![
			Ok(b"partial".to_vec()),
			Err(ApiError::Network("reset".into())),
			Ok(b"never".to_vec()),
		]);
		let mut out = String::new();
		let result = block_on(pump(chunks, |text| out.push_str(text)));
		assert_eq!(result, Err(ApiError::Network("reset".into())));
		assert_eq!(out, "partial");
	}

	#[test]
	fn entries_put_live_blocks_first_and_reverse_persisted() {
		let mut log = CommandLog::default();
		log.open("n", vec![record("a"), record("b"), record("c")]);
		let first = log.start_block("nmap");
		let second = log.start_block("whoami");

		let order: Vec<String> = log
			.entries()
			.into_iter()
			.map(|entry| match entry {
				LogEntry::Live(block) => format!("live:{}:{}", block.id, block.command),
				LogEntry::Persisted { index, record } => format!("{index}:{}", record.command),
			})
			.collect();
		assert_eq!(
			order,
			vec![
				format!("live:{second}:whoami"),
				format!("live:{first}:nmap"),
				"2:c".to_string(),
				"1:b".to_string(),
				"0:a".to_string(),
			]
		);
	}

	#[test]
	fn repopulate_keeps_running_blocks_only() {
		let mut log = CommandLog::default();
		log.open("n", Vec::new());
		let done = log.start_block("id");
		log.finish(done);
		let running = log.start_block("sleep 60");

		log.repopulate(vec![record("id")]);
		assert!(log.block(done).is_none());
		assert!(log.append(running, "late"));
		assert_eq!(log.entries().len(), 2);
	}

	#[test]
	fn reopening_or_closing_reports_running_blocks() {
		let mut log = CommandLog::default();
		log.open("a", Vec::new());
		let running = log.start_block("sleep 60");
		let done = log.start_block("id");
		log.finish(done);

		assert_eq!(log.open("b", vec![record("id")]), vec![running]);
		assert!(!log.append(running, "late"));
		assert_eq!(log.entries().len(), 1);

		let again = log.start_block("whoami");
		assert_eq!(log.close(), vec![again]);
		assert!(log.entries().is_empty());
	}

	#[test]
	fn fail_appends_bracketed_marker() {
		let mut log = CommandLog::default();
		let id = log.start_block("nc -lvp 4444");
		log.fail(id, "Failed to start command");
		let block = log.block(id).unwrap();
		assert_eq!(block.output, "\n[ERROR] Failed to start command\n");
		assert_eq!(block.status, BlockStatus::Failed("Failed to start command".into()));
	}

	#[test]
	fn cancel_node_aborts_only_that_nodes_reads() {
		let mut registry = StreamRegistry::default();
		let (h1, r1) = AbortHandle::new_pair();
		let (h2, r2) = AbortHandle::new_pair();
		registry.register(1, "a", h1);
		registry.register(2, "b", h2);

		assert_eq!(registry.cancel_node("a"), vec![1]);
		assert_eq!(registry.len(), 1);

		let aborted = block_on(Abortable::new(futures::future::pending::<()>(), r1));
		assert!(aborted.is_err());
		let running = Abortable::new(futures::future::ready(()), r2);
		assert!(block_on(running).is_ok());
	}
}

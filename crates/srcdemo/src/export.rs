//! Text reports over a decoded document.

use std::fmt::Write;

use srcdemo_common::BitWriter;

use crate::datatables::FxHashMap;
use crate::describe::{Describe, Describer};
use crate::document::DemoDocument;
use crate::Result;

impl DemoDocument {
    /// Render the whole document as indented text.
    ///
    /// Class and string-table references resolve against the document's
    /// final lookup state.
    pub fn dump(&self) -> String {
        let mut out = Describer::new(self.registry(), self.string_tables());
        self.header().describe(&mut out);
        out.field("Profile", self.profile().name);
        for frame in self.frames() {
            frame.describe(&mut out);
        }

        let trailer = self.trailer();
        match &trailer.stop {
            Some(stop) => out.heading(format_args!("Stop (tick {})", stop.tick)),
            None => out.heading("End of stream"),
        }
        if !trailer.bytes.is_empty() {
            out.indented(|out| out.field("trailing bytes", trailer.bytes.len()));
        }
        out.finish()
    }

    /// Message counts by kind, most frequent first.
    pub fn kind_counts(&self) -> Vec<(String, usize)> {
        sorted_counts(self.messages().map(|found| found.item.name()))
    }

    /// Frame counts by packet kind, most frequent first. The stop frame is
    /// not counted.
    pub fn packet_counts(&self) -> Vec<(String, usize)> {
        sorted_counts(self.frames().iter().map(|frame| frame.kind().name()))
    }

    /// Frame and message totals plus a per-kind breakdown.
    pub fn stats_report(&self) -> String {
        let mut out = String::new();
        let header = self.header();
        let _ = writeln!(out, "Map:      {}", header.map_name);
        let _ = writeln!(out, "Client:   {}", header.client_name);
        let _ = writeln!(out, "Profile:  {}", self.profile().name);
        let _ = writeln!(out, "Frames:   {}", self.frames().len());
        let _ = writeln!(out, "Messages: {}", self.messages().count());
        let _ = writeln!(out, "Classes:  {}", self.registry().len());

        let (baselines, unresolved) = self.string_tables().baseline_counts();
        if baselines > 0 {
            let _ = writeln!(out, "Baselines: {} ({} unresolved)", baselines, unresolved);
        }

        for counts in [self.packet_counts(), self.kind_counts()] {
            if counts.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            for (name, count) in counts {
                let _ = writeln!(out, "{:<28}{:>8}", name, count);
            }
        }
        out
    }

    /// One line per net message: tick, kind, encoded size and hex bytes.
    pub fn message_dump(&self) -> Result<String> {
        let mut out = String::new();
        for found in self.messages() {
            let mut writer = BitWriter::new();
            found.item.encode_tagged(&mut writer, self.profile())?;
            let bits = writer.finish();
            let _ = writeln!(
                out,
                "[{}] {} {} {}",
                found.tick,
                found.item.name(),
                bits.bit_len(),
                bits.to_hex()
            );
        }
        Ok(out)
    }
}

fn sorted_counts<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

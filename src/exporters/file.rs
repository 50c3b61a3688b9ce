use crate::errors::TrackerError;
use crate::exporters::{EmissionsRecord, Exporter, CSV_HEADER};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// An Exporter that appends each record as a CSV line to a file,
/// writing the header line first when the file is new or empty.
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    pub fn new<P: AsRef<Path>>(path: P) -> FileExporter {
        FileExporter {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for FileExporter {
    fn export(&mut self, record: &EmissionsRecord) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut lines = String::new();
        if needs_header {
            lines.push_str(&CSV_HEADER.join(","));
            lines.push('\n');
        }
        lines.push_str(&record.to_csv_line());
        lines.push('\n');

        let mut out_writer = BufWriter::new(file);
        out_writer.write_all(lines.as_bytes())?;
        out_writer.flush()?;
        info!("Emissions record appended to {}", self.path.display());
        Ok(())
    }

    fn kind(&self) -> &str {
        "file"
    }
}


//  Copyright 2020 The co2-tracker authors.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

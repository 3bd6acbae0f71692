//! Parser for the simulator's raw reaction log.

use std::fs;
use std::path::Path;

use cgmath::Vector3;

use crate::error::{ReplayError, Result};
use crate::schema::{RawReaction, SpaceTransform};

/// Parse log text: one reaction per line, `frame time x y z type`.
///
/// Event positions are mapped with `transform` so they share the space of
/// decoded frames. Blank lines are skipped; trailing extra columns are
/// ignored.
pub fn parse_reaction_log(text: &str, transform: SpaceTransform) -> Result<Vec<RawReaction>> {
    let mut reactions = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 6 {
            return Err(ReplayError::malformed(format!(
                "reaction log line {}: expected 6 fields, found {}",
                line_no + 1,
                fields.len()
            )));
        }

        let bad = |field: &str, e: &dyn std::fmt::Display| {
            ReplayError::malformed(format!(
                "reaction log line {}: bad value {:?}: {}",
                line_no + 1,
                field,
                e
            ))
        };
        let float = |s: &str| s.parse::<f32>().map_err(|e| bad(s, &e));

        let frame = fields[0].parse::<usize>().map_err(|e| bad(fields[0], &e))?;
        let time = float(fields[1])?;
        let position = Vector3::new(float(fields[2])?, float(fields[3])?, float(fields[4])?);

        reactions.push(RawReaction {
            frame,
            time,
            position: transform.position(position),
            type_tag: fields[5].to_string(),
        });
    }

    Ok(reactions)
}

/// Load and parse a reaction log file.
pub fn load_reaction_log<P: AsRef<Path>>(
    path: P,
    transform: SpaceTransform,
) -> Result<Vec<RawReaction>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReplayError::MissingFile {
            role: "reaction log",
            path: path.to_path_buf(),
        });
    }
    let reactions = parse_reaction_log(&fs::read_to_string(path)?, transform)?;
    log::info!("Read {} reactions from {}", reactions.len(), path.display());
    Ok(reactions)
}

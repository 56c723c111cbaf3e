//! Line classification for mysqldump output.

/// What a dump line carries for the translated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Comments, table locks and `DROP TABLE` boilerplate
    Noise,
    /// An `INSERT INTO` data statement
    Insert,
    /// Anything else (schema DDL, session settings); not carried over
    Other,
}

/// Prefixes of lines that carry nothing for the target database.
const NOISE_PREFIXES: &[&str] = &["--", "/*", "LOCK TABLES", "UNLOCK TABLES", "DROP TABLE"];

const INSERT_PREFIX: &str = "INSERT INTO";

/// Classify one line of a dump. Surrounding whitespace is ignored.
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() || NOISE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        LineKind::Noise
    } else if trimmed.starts_with(INSERT_PREFIX) {
        LineKind::Insert
    } else {
        LineKind::Other
    }
}

/// One input line together with its classification.
#[derive(Debug, Clone, Copy)]
pub struct DumpLine<'a> {
    raw: &'a str,
    trimmed: &'a str,
    kind: LineKind,
}

impl<'a> DumpLine<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            trimmed: raw.trim(),
            kind: classify(raw),
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn trimmed(&self) -> &'a str {
        self.trimmed
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_lines() {
        for line in [
            "",
            "   ",
            "\r\n",
            "-- MySQL dump 10.13  Distrib 5.6.35",
            "/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;",
            "LOCK TABLES \"user\" WRITE;",
            "UNLOCK TABLES;",
            "DROP TABLE IF EXISTS \"user\";",
            "   -- indented comment",
        ] {
            assert_eq!(classify(line), LineKind::Noise, "line: {:?}", line);
        }
    }

    #[test]
    fn test_insert_lines() {
        assert_eq!(
            classify("INSERT INTO \"user\" VALUES (1,'admin');"),
            LineKind::Insert
        );
        assert_eq!(
            classify("  INSERT INTO `project` VALUES (1,0);\n"),
            LineKind::Insert
        );
    }

    #[test]
    fn test_other_lines() {
        assert_eq!(classify("CREATE TABLE \"user\" ("), LineKind::Other);
        assert_eq!(classify("  `user_id` int(11) NOT NULL,"), LineKind::Other);
        assert_eq!(classify(") ENGINE=InnoDB;"), LineKind::Other);
        // Prefix matching is case-sensitive, as mysqldump always emits uppercase
        assert_eq!(classify("insert into user values (1);"), LineKind::Other);
    }

    #[test]
    fn test_dump_line_keeps_raw_and_trimmed() {
        let line = DumpLine::new("  INSERT INTO \"project\" VALUES (1,0);\r\n");
        assert_eq!(line.kind(), LineKind::Insert);
        assert_eq!(line.trimmed(), "INSERT INTO \"project\" VALUES (1,0);");
        assert!(line.raw().ends_with("\r\n"));
    }
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::error::Error;

/// Families tried in order when no explicit font file is configured. The first
/// one that covers Arabic presentation forms wins.
const PREFERRED_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Noto Sans",
    "Arial",
    "FreeSans",
    "Liberation Sans",
];

/// Probe character for Arabic coverage (lam-alef ligature, presentation forms-B).
const ARABIC_PROBE: char = '\u{FEFB}';

/// Average Helvetica glyph width used for characters outside WinAnsi.
const FALLBACK_CHAR_WIDTH: f32 = 556.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Regular,
    Bold,
}

/// Where to look for the body fonts.
#[derive(Clone, Debug, Default)]
pub struct FontConfig {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    pub search_dirs: Vec<PathBuf>,
}

impl FontConfig {
    /// `HEALTHREPORT_FONT_REGULAR` / `HEALTHREPORT_FONT_BOLD` name explicit files,
    /// `HEALTHREPORT_FONTS` adds search directories (`:` separated, `;` on Windows).
    pub fn from_env() -> Self {
        let mut search_dirs = Vec::new();
        if let Ok(val) = std::env::var("HEALTHREPORT_FONTS") {
            let sep = if cfg!(windows) { ';' } else { ':' };
            search_dirs.extend(
                val.split(sep)
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from),
            );
        }
        Self {
            regular: std::env::var_os("HEALTHREPORT_FONT_REGULAR").map(PathBuf::from),
            bold: std::env::var_os("HEALTHREPORT_FONT_BOLD").map(PathBuf::from),
            search_dirs,
        }
    }
}

pub(crate) struct TrueTypeFont {
    pub(crate) family: String,
    data: Mmap,
    face_index: u32,
}

impl TrueTypeFont {
    fn open(path: &Path, face_index: u32) -> Result<Self, Error> {
        let font_err = |reason: String| Error::Font {
            path: path.to_path_buf(),
            reason,
        };
        let file = std::fs::File::open(path)?;
        let data = unsafe { Mmap::map(&file) }?;
        let family = {
            let face = Face::parse(&data, face_index).map_err(|e| font_err(e.to_string()))?;
            font_family_name(&face).unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Embedded".to_string())
            })
        };
        Ok(Self {
            family,
            data,
            face_index,
        })
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }
}

pub(crate) enum FontSource {
    TrueType(TrueTypeFont),
    Helvetica { bold: bool },
}

impl FontSource {
    /// Width of `text` at `font_size`, in points.
    pub(crate) fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let units_1000: f32 = match self {
            FontSource::TrueType(font) => match font.face() {
                Some(face) => {
                    let units = face.units_per_em() as f32;
                    text.chars()
                        .map(|ch| {
                            face.glyph_index(ch)
                                .and_then(|gid| face.glyph_hor_advance(gid))
                                .map(|adv| adv as f32 / units * 1000.0)
                                .unwrap_or(FALLBACK_CHAR_WIDTH)
                        })
                        .sum()
                }
                None => text.chars().count() as f32 * FALLBACK_CHAR_WIDTH,
            },
            FontSource::Helvetica { bold } => {
                let widths = helvetica_widths();
                let scale = if *bold { 1.05 } else { 1.0 };
                text.chars()
                    .map(|ch| match char_to_winansi(ch) {
                        0 => FALLBACK_CHAR_WIDTH,
                        byte if byte >= 32 => widths[(byte - 32) as usize] * scale,
                        _ => 0.0,
                    })
                    .sum()
            }
        };
        units_1000 * font_size / 1000.0
    }

    fn covers_arabic(&self) -> bool {
        match self {
            FontSource::TrueType(font) => font
                .face()
                .is_some_and(|face| face.glyph_index(ARABIC_PROBE).is_some()),
            FontSource::Helvetica { .. } => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            FontSource::TrueType(font) => font.family.clone(),
            FontSource::Helvetica { bold: false } => "Helvetica".to_string(),
            FontSource::Helvetica { bold: true } => "Helvetica-Bold".to_string(),
        }
    }
}

/// The regular and bold faces a document is drawn with.
pub struct Fonts {
    pub(crate) regular: FontSource,
    pub(crate) bold: FontSource,
}

impl Fonts {
    /// Resolve fonts from explicit paths, then discovered families, then the
    /// built-in Helvetica metrics.
    pub fn load(config: &FontConfig) -> Result<Self, Error> {
        let regular = match &config.regular {
            Some(path) => FontSource::TrueType(TrueTypeFont::open(path, 0)?),
            None => discover(config, false).unwrap_or(FontSource::Helvetica { bold: false }),
        };
        let bold = match &config.bold {
            Some(path) => FontSource::TrueType(TrueTypeFont::open(path, 0)?),
            None => discover(config, true).unwrap_or(FontSource::Helvetica { bold: true }),
        };

        if !regular.covers_arabic() {
            log::warn!(
                "Font {} has no Arabic presentation forms; Arabic text will not render",
                regular.describe()
            );
        }
        log::debug!("Fonts: regular={} bold={}", regular.describe(), bold.describe());
        Ok(Self { regular, bold })
    }

    /// Helvetica / Helvetica-Bold with no embedding.
    pub fn builtin() -> Self {
        Self {
            regular: FontSource::Helvetica { bold: false },
            bold: FontSource::Helvetica { bold: true },
        }
    }

    pub(crate) fn source(&self, style: FontStyle) -> &FontSource {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
        }
    }

    pub fn text_width(&self, text: &str, style: FontStyle, font_size: f32) -> f32 {
        self.source(style).text_width(text, font_size)
    }
}

/// (lowercase family name, bold) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool), (PathBuf, u32)>;

/// One index per distinct list of configured directories.
static FONT_INDEX: OnceLock<Mutex<HashMap<Vec<PathBuf>, Arc<FontLookup>>>> = OnceLock::new();

fn font_family_name(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .find(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .and_then(|name| name.to_string())
}

fn system_font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

/// Index every upright face under `root`. Faces from configured directories
/// replace system ones with the same key.
fn scan_tree(
    root: &Path,
    overwrite: bool,
    index: &mut FontLookup,
    visited: &mut HashSet<PathBuf>,
) -> u32 {
    let mut files_scanned = 0u32;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            files_scanned += 1;
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                // Regular/bold upright faces only
                if face.is_italic() {
                    continue;
                }
                let Some(family) = font_family_name(&face) else {
                    continue;
                };
                let key = (family.to_lowercase(), face.is_bold());
                if overwrite {
                    index.insert(key, (path.clone(), face_idx));
                } else {
                    index.entry(key).or_insert((path.clone(), face_idx));
                }
            }
        }
    }
    files_scanned
}

fn scan_font_dirs(extra_dirs: &[PathBuf]) -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut files_scanned = 0u32;

    for dir in system_font_directories() {
        files_scanned += scan_tree(&dir, false, &mut index, &mut visited);
    }
    for dir in extra_dirs {
        visited.clear();
        files_scanned += scan_tree(dir, true, &mut index, &mut visited);
    }

    log::info!(
        "Font scan: {:.1}ms, {} files parsed -> {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        files_scanned,
        index.len(),
    );
    index
}

fn font_index(extra_dirs: &[PathBuf]) -> Arc<FontLookup> {
    let mut cache = FONT_INDEX
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    cache
        .entry(extra_dirs.to_vec())
        .or_insert_with(|| Arc::new(scan_font_dirs(extra_dirs)))
        .clone()
}

fn discover(config: &FontConfig, bold: bool) -> Option<FontSource> {
    let index = font_index(&config.search_dirs);

    let mut first_available: Option<FontSource> = None;
    for family in PREFERRED_FAMILIES {
        let Some((path, face_index)) = index.get(&(family.to_lowercase(), bold)) else {
            continue;
        };
        let source = match TrueTypeFont::open(path, *face_index) {
            Ok(font) => FontSource::TrueType(font),
            Err(e) => {
                log::warn!("Skipping font {}: {e}", path.display());
                continue;
            }
        };
        if source.covers_arabic() {
            return Some(source);
        }
        first_available.get_or_insert(source);
    }

    if first_available.is_none() {
        log::warn!(
            "No {} font found among {:?}; using Helvetica",
            if bold { "bold" } else { "regular" },
            PREFERRED_FAMILIES
        );
    }
    first_available
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95, // bullet
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// WinAnsi bytes for a Helvetica `Str`; unmappable characters are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(char_to_winansi)
        .filter(|&b| b != 0)
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.extend_from_slice(&gid.to_be_bytes());
    }
    out
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> &'static [f32] {
    static WIDTHS: OnceLock<Vec<f32>> = OnceLock::new();
    WIDTHS.get_or_init(|| {
        (32u8..=255u8)
            .map(|b| match b {
                32 => 278.0,                          // space
                33..=47 => 333.0,                     // punctuation
                48..=57 => 556.0,                     // digits
                58..=64 => 333.0,                     // more punctuation
                73 | 74 => 278.0,                     // I J (narrow uppercase)
                77 => 833.0,                          // M (wide)
                65..=90 => 667.0,                     // uppercase A-Z (average)
                91..=96 => 333.0,                     // brackets etc.
                102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
                109 | 119 => 833.0,                   // m w (wide)
                97..=122 => 556.0,                    // lowercase a-z (average)
                0x95 => 350.0,                        // bullet
                _ => 556.0,
            })
            .collect()
    })
}

/// A font written into the PDF, ready to be referenced from content streams.
pub(crate) struct EmbeddedFont {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl EmbeddedFont {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H
/// encoding, subset to the characters the document uses.
fn embed_truetype(
    pdf: &mut Pdf,
    font: &TrueTypeFont,
    font_ref: Ref,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = font.face()?;
    let units = face.units_per_em() as f32;
    let to_1000 = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        to_1000(bb.x_min as f32),
        to_1000(bb.y_min as f32),
        to_1000(bb.x_max as f32),
        to_1000(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();
    for ch in chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let w = face
                .glyph_hor_advance(gid)
                .map(|adv| to_1000(adv as f32))
                .unwrap_or(0.0);
            gid_widths.push((new_gid, w));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(&font.data, font.face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {}: {e}; embedding full font", font.family);
        font.data.to_vec()
    });

    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_font_ref = alloc();
    let tounicode_ref = alloc();

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name = font.family.replace(' ', "");

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(to_1000(face.ascender() as f32))
        .descent(to_1000(face.descender() as f32))
        .cap_height(face.capital_height().map(|h| to_1000(h as f32)).unwrap_or(700.0))
        .stem_v(80.0)
        .font_file2(data_ref);

    let system_info = pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info);
    for (&ch, &new_gid) in &char_to_gid {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(char_to_gid)
}

pub(crate) fn register_font(
    pdf: &mut Pdf,
    source: &FontSource,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
    used_chars: &HashSet<char>,
) -> EmbeddedFont {
    let t0 = std::time::Instant::now();
    let font_ref = alloc();

    let char_to_gid = match source {
        FontSource::TrueType(font) => embed_truetype(pdf, font, font_ref, used_chars, alloc)
            .or_else(|| {
                log::warn!("Embedding {} failed; using Helvetica", font.family);
                None
            }),
        FontSource::Helvetica { .. } => None,
    };

    if char_to_gid.is_none() {
        let base: &[u8] = match source {
            FontSource::Helvetica { bold: true } => b"Helvetica-Bold",
            _ => b"Helvetica",
        };
        pdf.type1_font(font_ref)
            .base_font(Name(base))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    log::debug!(
        "register_font: {} as {pdf_name} ({} chars) -> {:.1}ms",
        source.describe(),
        used_chars.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    EmbeddedFont {
        pdf_name,
        font_ref,
        char_to_gid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_scale_with_size() {
        let font = FontSource::Helvetica { bold: false };
        let w12 = font.text_width("Hemoglobin", 12.0);
        let w24 = font.text_width("Hemoglobin", 24.0);
        assert!(w12 > 0.0);
        assert!((w24 - 2.0 * w12).abs() < 1e-3);
    }

    #[test]
    fn unmappable_chars_still_take_space() {
        let font = FontSource::Helvetica { bold: false };
        assert!(font.text_width("\u{FEFB}", 12.0) > 0.0);
        assert!(to_winansi_bytes("a\u{FEFB}b").len() == 2);
    }

    #[test]
    fn bold_is_wider() {
        let regular = FontSource::Helvetica { bold: false };
        let bold = FontSource::Helvetica { bold: true };
        assert!(bold.text_width("Result", 12.0) > regular.text_width("Result", 12.0));
    }

    #[test]
    fn font_index_is_cached_per_directory_list() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let dirs_a = vec![a.path().to_path_buf()];
        let dirs_b = vec![b.path().to_path_buf()];

        let first = font_index(&dirs_a);
        assert!(Arc::ptr_eq(&first, &font_index(&dirs_a)));
        assert!(!Arc::ptr_eq(&first, &font_index(&dirs_b)));
    }

    #[test]
    fn gid_encoding_is_big_endian() {
        let map = HashMap::from([('a', 0x0102u16)]);
        assert_eq!(encode_as_gids("a?", &map), vec![0x01, 0x02, 0x00, 0x00]);
    }
}

use lumen_fixtures::{FixtureCatalog, GroupMember, Target};

use crate::error::{EngineError, Result};
use crate::health::FixtureHealth;

/// A contiguous pixel interval on a single fixture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub fixture_id: String,
    pub pixel_offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(fixture_id: impl Into<String>, pixel_offset: usize, length: usize) -> Self {
        Span {
            fixture_id: fixture_id.into(),
            pixel_offset,
            length,
        }
    }

    fn overlaps(&self, other: &Span) -> bool {
        self.fixture_id == other.fixture_id
            && self.pixel_offset < other.pixel_offset + other.length
            && other.pixel_offset < self.pixel_offset + self.length
    }
}

/// Resolve a logical target into an ordered list of physical spans.
///
/// Member/range declaration order is preserved, duplicates included.
/// Spans on excluded or unhealthy fixtures are dropped. The sum of the
/// returned span lengths is the logical strip length an effect renders
/// against; mapping back to fixtures is the session loop's job.
pub fn resolve(
    target: &Target,
    catalog: &FixtureCatalog,
    health: &FixtureHealth,
    excluded_fixtures: &[String],
) -> Result<Vec<Span>> {
    let mut spans = Vec::new();

    match target {
        Target::Device(id) => {
            let fixture = catalog
                .fixture(id)
                .ok_or_else(|| EngineError::NotFound(format!("fixture '{}'", id)))?;
            spans.push(Span::new(&fixture.id, 0, fixture.pixel_count));
        }
        Target::Group(id) => {
            let group = catalog
                .group(id)
                .ok_or_else(|| EngineError::NotFound(format!("group '{}'", id)))?;
            for member in &group.members {
                let fixture = catalog
                    .fixture(member.fixture_id())
                    .ok_or_else(|| EngineError::NotFound(format!("fixture '{}'", member.fixture_id())))?;
                match member {
                    GroupMember::Whole { .. } => {
                        spans.push(Span::new(&fixture.id, 0, fixture.pixel_count));
                    }
                    GroupMember::Range {
                        start_pixel,
                        end_pixel,
                        ..
                    } => {
                        spans.push(Span::new(&fixture.id, *start_pixel, end_pixel - start_pixel + 1));
                    }
                }
            }
        }
        Target::Virtual(id) => {
            let virt = catalog
                .virtual_device(id)
                .ok_or_else(|| EngineError::NotFound(format!("virtual '{}'", id)))?;
            for range in &virt.ranges {
                if catalog.fixture(&range.fixture_id).is_none() {
                    return Err(EngineError::NotFound(format!("fixture '{}'", range.fixture_id)));
                }
                spans.push(Span::new(
                    &range.fixture_id,
                    range.start_pixel,
                    range.end_pixel - range.start_pixel + 1,
                ));
            }
        }
    }

    spans.retain(|span| {
        !excluded_fixtures.iter().any(|id| *id == span.fixture_id)
            && health.is_healthy(&span.fixture_id)
    });
    Ok(spans)
}

/// Total pixel length of a resolved target.
pub fn resolved_length(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.length).sum()
}

/// Whether any span of `a` overlaps any span of `b` on the same fixture.
pub fn spans_intersect(a: &[Span], b: &[Span]) -> bool {
    a.iter().any(|sa| b.iter().any(|sb| sa.overlaps(sb)))
}

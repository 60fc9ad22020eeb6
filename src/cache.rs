use rand::Rng;

/// One cache slot. `None` until the slot is filled for the first time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheLine {
    pub tag: Option<u64>,
}

impl CacheLine {
    fn holds(&self, tag: u64) -> bool {
        self.tag == Some(tag)
    }

    fn replace(&mut self, tag: u64) -> Option<u64> {
        self.tag.replace(tag)
    }
}

/// Address split for a cache of `index_count` slots (or sets) of `line_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub line_size: u64,
    pub index_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposed {
    pub tag: u64,
    pub index: usize,
}

impl Geometry {
    pub fn new(line_size: u64, index_count: usize) -> Self {
        Self {
            line_size,
            index_count: index_count as u64,
        }
    }

    pub fn index(&self, address: u64) -> usize {
        ((address / self.line_size) % self.index_count) as usize
    }

    pub fn tag(&self, address: u64) -> u64 {
        address / (self.line_size * self.index_count)
    }

    pub fn decompose(&self, address: u64) -> Decomposed {
        Decomposed {
            tag: self.tag(address),
            index: self.index(address),
        }
    }

    /// Base address of the line holding `tag` at `index`.
    pub fn line_address(&self, index: usize, tag: u64) -> u64 {
        tag * (self.index_count * self.line_size) + index as u64 * self.line_size
    }
}

/// Direct-mapped cache: one line per index.
#[derive(Debug, Clone)]
pub struct DirectMappedCache {
    geometry: Geometry,
    lines: Vec<CacheLine>,
}

impl DirectMappedCache {
    pub fn new(line_size: u64, line_count: usize) -> Self {
        Self {
            geometry: Geometry::new(line_size, line_count),
            lines: vec![CacheLine::default(); line_count],
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn lookup(&self, index: usize, tag: u64) -> bool {
        self.lines[index].holds(tag)
    }

    /// Installs `tag` at `index` and returns the tag it displaced, if any.
    pub fn install(&mut self, index: usize, tag: u64) -> Option<u64> {
        self.lines[index].replace(tag)
    }
}

/// K ways of one L2 set.
#[derive(Debug, Clone)]
pub struct L2Set {
    lines: Vec<CacheLine>,
}

impl L2Set {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![CacheLine::default(); ways],
        }
    }

    pub fn ways(&self) -> usize {
        self.lines.len()
    }

    pub fn find_line(&self, tag: u64) -> Option<usize> {
        self.lines.iter().position(|line| line.holds(tag))
    }

    pub fn resident_tags(&self) -> impl Iterator<Item = u64> + '_ {
        self.lines.iter().filter_map(|line| line.tag)
    }

    fn replace_way(&mut self, way: usize, tag: u64) -> Option<u64> {
        self.lines[way].replace(tag)
    }
}

/// Set-associative cache with random replacement.
#[derive(Debug, Clone)]
pub struct SetAssociativeCache {
    geometry: Geometry,
    sets: Vec<L2Set>,
}

impl SetAssociativeCache {
    pub fn new(line_size: u64, set_count: usize, associativity: usize) -> Self {
        let sets = (0..set_count).map(|_| L2Set::new(associativity)).collect();
        Self {
            geometry: Geometry::new(line_size, set_count),
            sets,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn associativity(&self) -> usize {
        self.sets.first().map_or(0, L2Set::ways)
    }

    pub fn set(&self, index: usize) -> &L2Set {
        &self.sets[index]
    }

    pub fn lookup(&self, index: usize, tag: u64) -> bool {
        self.sets[index].find_line(tag).is_some()
    }

    /// Installs `tag` into a way of set `index` chosen uniformly at random,
    /// returning the tag it displaced. Empty ways are not preferred; a victim
    /// is drawn even when the set has free slots.
    pub fn install<R: Rng + ?Sized>(&mut self, index: usize, tag: u64, rng: &mut R) -> Option<u64> {
        let set = &mut self.sets[index];
        if set.find_line(tag).is_some() {
            return None;
        }
        let way = rng.gen_range(0..set.ways());
        set.replace_way(way, tag)
    }
}

/// A route table and the request paths dispatched against it
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    table: RouteTable,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, table: RouteTable) -> Self {
        Self { name, group, table }
    }

    pub fn small(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Small, table)
    }

    pub fn normal(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Normal, table)
    }

    pub fn large(name: &'static str, table: RouteTable) -> Self {
        Self::new(name, TestGroup::Large, table)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }
}

#[derive(Debug, Copy, Clone)]
pub struct RouteTable {
    routes: &'static [&'static str],
    requests: &'static [&'static str],
}

impl RouteTable {
    pub const fn new(routes: &'static [&'static str], requests: &'static [&'static str]) -> Self {
        Self { routes, requests }
    }

    /// Registration paths, `:name` and `*` segments included
    pub fn routes(&self) -> &'static [&'static str] {
        self.routes
    }

    /// Concrete request paths, each matching one of the routes
    pub fn requests(&self) -> &'static [&'static str] {
        self.requests
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

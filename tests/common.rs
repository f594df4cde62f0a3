// Common test utilities

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Assembles minimal classfile images so integration tests can lay real
/// classpath roots on disk. Only the parts the index reads are emitted:
/// constant pool, hierarchy, member signatures, and Code attributes for
/// the invocations each method makes.
pub struct ClassFileBuilder {
    name: String,
    super_name: String,
    fields: Vec<(String, String)>,
    methods: Vec<MethodEntry>,
}

struct MethodEntry {
    name: String,
    descriptor: String,
    access: u16,
    calls: Vec<(String, String, String)>,
}

impl ClassFileBuilder {
    /// `super_name` may be empty for a root class with no superclass
    pub fn new(name: &str, super_name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: super_name.to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub fn method(self, name: &str, descriptor: &str, access: u16) -> Self {
        self.method_calling(name, descriptor, access, &[])
    }

    /// A method whose Code attribute invokes each `(class, name, descriptor)`
    /// in order
    pub fn method_calling(
        mut self,
        name: &str,
        descriptor: &str,
        access: u16,
        calls: &[(&str, &str, &str)],
    ) -> Self {
        self.methods.push(MethodEntry {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
            calls: calls
                .iter()
                .map(|(c, n, d)| (c.to_string(), n.to_string(), d.to_string()))
                .collect(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = ConstantPool::default();
        let this_class = pool.class(&self.name);
        let super_class = if self.super_name.is_empty() {
            0
        } else {
            pool.class(&self.super_name)
        };

        // fields and methods reference pool entries, so they are assembled
        // first and the finished pool is spliced in ahead of them
        let mut body = Vec::new();
        body.extend((self.fields.len() as u16).to_be_bytes());
        for (name, descriptor) in &self.fields {
            body.extend(0x0001u16.to_be_bytes()); // public
            body.extend(pool.utf8(name).to_be_bytes());
            body.extend(pool.utf8(descriptor).to_be_bytes());
            body.extend(0u16.to_be_bytes()); // no attributes
        }

        body.extend((self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            body.extend(method.access.to_be_bytes());
            body.extend(pool.utf8(&method.name).to_be_bytes());
            body.extend(pool.utf8(&method.descriptor).to_be_bytes());
            if method.calls.is_empty() {
                body.extend(0u16.to_be_bytes());
                continue;
            }
            body.extend(1u16.to_be_bytes()); // just the Code attribute
            let code_attr = pool.utf8("Code");
            let mut code = Vec::new();
            for (class, name, descriptor) in &method.calls {
                let index = pool.method_ref(class, name, descriptor);
                code.push(0x2a); // aload_0
                code.push(if name == "<init>" { 0xb7 } else { 0xb6 });
                code.extend(index.to_be_bytes());
            }
            code.push(0xb1); // return
            body.extend(code_attr.to_be_bytes());
            body.extend(((12 + code.len()) as u32).to_be_bytes());
            body.extend(8u16.to_be_bytes()); // max_stack
            body.extend(8u16.to_be_bytes()); // max_locals
            body.extend((code.len() as u32).to_be_bytes());
            body.extend(&code);
            body.extend(0u16.to_be_bytes()); // exception table
            body.extend(0u16.to_be_bytes()); // code attributes
        }
        body.extend(0u16.to_be_bytes()); // class attributes

        let mut out = Vec::new();
        out.extend(0xCAFEBABEu32.to_be_bytes());
        out.extend(0u16.to_be_bytes()); // minor
        out.extend(52u16.to_be_bytes()); // major (Java 8)
        out.extend(((pool.entries.len() + 1) as u16).to_be_bytes());
        for entry in &pool.entries {
            out.extend(entry);
        }
        out.extend(0x0021u16.to_be_bytes()); // ACC_PUBLIC | ACC_SUPER
        out.extend(this_class.to_be_bytes());
        out.extend(super_class.to_be_bytes());
        out.extend(0u16.to_be_bytes()); // no interfaces
        out.extend(&body);
        out
    }

    /// Write the image under `root` at its internal-name path, creating
    /// package directories as needed
    pub fn write_to(&self, root: &Path) -> io::Result<()> {
        let path = root.join(format!("{}.class", self.name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.build())
    }
}

#[derive(Default)]
struct ConstantPool {
    entries: Vec<Vec<u8>>,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
}

impl ConstantPool {
    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8_cache.get(text) {
            return index;
        }
        let mut entry = vec![1u8];
        entry.extend((text.len() as u16).to_be_bytes());
        entry.extend(text.as_bytes());
        let index = self.push(entry);
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_cache.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend(name_index.to_be_bytes());
        let index = self.push(entry);
        self.class_cache.insert(name.to_string(), index);
        index
    }

    fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_index = self.utf8(name);
        let desc_index = self.utf8(descriptor);
        let mut nat = vec![12u8];
        nat.extend(name_index.to_be_bytes());
        nat.extend(desc_index.to_be_bytes());
        let nat_index = self.push(nat);
        let mut entry = vec![10u8];
        entry.extend(class_index.to_be_bytes());
        entry.extend(nat_index.to_be_bytes());
        self.push(entry)
    }
}

pub(super) struct FileDescriptorProtoLocations;

impl FileDescriptorProtoLocations {
    pub const SERVICE: i32 = 6;
}

pub(super) struct ServiceDescriptorProtoLocations;

impl ServiceDescriptorProtoLocations {
    pub const METHOD: i32 = 2;
}
